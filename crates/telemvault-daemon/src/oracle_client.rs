// Copyright (c) 2026 TelemVault Contributors
// SPDX-License-Identifier: Apache-2.0

use parking_lot::Mutex;
use telemvault_attest::{verify_callback_proof, TrustedOracleKeys};
use telemvault_core::{
    CipherArithmetic, CiphertextHandle, DecryptionOracle, ProofVerifier, RegistryResult,
    RequestPurpose,
};
use telemvault_protocol::{sha256_domain, CallbackProof, RequestId, DOMAIN_REQUEST_ID_V1};

/// Outbound half of the oracle seam. The real decryption service is
/// external and answers through the callback RPCs; this side only
/// hands ciphertexts off and issues the correlation id the answer
/// must quote.
#[derive(Debug, Default)]
pub struct LoopbackOracle {
    counter: Mutex<u64>,
}

impl LoopbackOracle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DecryptionOracle for LoopbackOracle {
    fn request_decryption(
        &self,
        ciphertexts: &[CiphertextHandle],
        purpose: RequestPurpose,
    ) -> RegistryResult<RequestId> {
        let mut counter = self.counter.lock();
        *counter += 1;
        let mut buf = counter.to_be_bytes().to_vec();
        for ct in ciphertexts {
            buf.extend_from_slice(ct.as_bytes());
        }
        let request_id = sha256_domain(DOMAIN_REQUEST_ID_V1, &buf);
        tracing::debug!(
            request_id = %hex::encode(request_id),
            ciphertexts = ciphertexts.len(),
            ?purpose,
            "handed ciphertexts to the decryption oracle"
        );
        Ok(request_id)
    }
}

/// Bridges the registry's proof seam to the attest crate's ed25519
/// verification against the configured trusted key set.
#[derive(Debug)]
pub struct AttestVerifier {
    keys: TrustedOracleKeys,
}

impl AttestVerifier {
    #[must_use]
    pub fn new(keys: TrustedOracleKeys) -> Self {
        Self { keys }
    }
}

impl ProofVerifier for AttestVerifier {
    fn verify(&self, request_id: &RequestId, payload: &[u8], proof: &CallbackProof) -> bool {
        match verify_callback_proof(&self.keys, request_id, payload, proof) {
            Ok(()) => true,
            Err(reason) => {
                tracing::warn!(
                    %reason,
                    key_id = %proof.key_id,
                    request_id = %hex::encode(request_id),
                    "callback proof rejected"
                );
                false
            }
        }
    }
}

/// Re-export of the development cipher backend the daemon wires in
/// until a homomorphic backend lands behind [`CipherArithmetic`].
pub use telemvault_core::DevTallyCipher;
