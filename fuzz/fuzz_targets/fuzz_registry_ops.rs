#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use telemvault_core::{
    CiphertextHandle, DecryptionOracle, DevTallyCipher, ProofVerifier, RegistryResult,
    RequestPurpose, TelemetryRegistry,
};
use telemvault_protocol::{sha256_domain, CallbackProof, RequestId, DOMAIN_REQUEST_ID_V1};

#[derive(Debug, Arbitrary)]
enum Op {
    Submit(u8, u8),
    RequestPrediction(u8),
    Callback(u8, u64),
    GetPrediction(u8),
    RequestAggregate(u8),
    AggregateCallback(u8, u64),
}

struct SeqOracle(std::sync::atomic::AtomicU64);

impl DecryptionOracle for SeqOracle {
    fn request_decryption(
        &self,
        ciphertexts: &[CiphertextHandle],
        _purpose: RequestPurpose,
    ) -> RegistryResult<RequestId> {
        let n = self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let mut buf = n.to_be_bytes().to_vec();
        for ct in ciphertexts {
            buf.extend_from_slice(ct.as_bytes());
        }
        Ok(sha256_domain(DOMAIN_REQUEST_ID_V1, &buf))
    }
}

struct AcceptAll;

impl ProofVerifier for AcceptAll {
    fn verify(&self, _request_id: &RequestId, _payload: &[u8], _proof: &CallbackProof) -> bool {
        true
    }
}

// Arbitrary op interleavings must never panic the registry, and every
// error must leave it able to keep serving.
fuzz_target!(|data: &[u8]| {
    let mut u = Unstructured::new(data);
    let Ok(ops) = Vec::<Op>::arbitrary(&mut u) else {
        return;
    };

    let dir = tempfile::tempdir().expect("tempdir");
    let registry = TelemetryRegistry::open(
        dir.path().join("journal.log"),
        Box::new(SeqOracle(std::sync::atomic::AtomicU64::new(0))),
        Box::new(AcceptAll),
        Box::new(DevTallyCipher),
    )
    .expect("registry");

    let proof = CallbackProof {
        key_id: "fuzz".to_string(),
        signature: Vec::new(),
    };
    let mut issued: Vec<RequestId> = Vec::new();

    for op in ops {
        match op {
            Op::Submit(a, b) => {
                let _ = registry.submit(
                    CiphertextHandle::new(vec![a; 8]),
                    CiphertextHandle::new(vec![b; 8]),
                );
            }
            Op::RequestPrediction(id) => {
                if let Ok(request_id) = registry.request_prediction(u64::from(id)) {
                    issued.push(request_id);
                }
            }
            Op::Callback(idx, rul) => {
                if let Some(request_id) = issued.get(usize::from(idx) % issued.len().max(1)) {
                    let _ = registry.process_callback(*request_id, &rul.to_be_bytes(), &proof);
                }
            }
            Op::GetPrediction(id) => {
                let _ = registry.get_prediction(u64::from(id));
            }
            Op::RequestAggregate(id) => {
                let equipment_id = format!("EQ-{id}");
                if let Ok(request_id) = registry.request_aggregate_decryption(&equipment_id) {
                    issued.push(request_id);
                }
            }
            Op::AggregateCallback(idx, count) => {
                if let Some(request_id) = issued.get(usize::from(idx) % issued.len().max(1)) {
                    let _ =
                        registry.process_aggregate_callback(*request_id, &count.to_be_bytes(), &proof);
                }
            }
        }
    }
});
