use std::collections::BTreeMap;

use anyhow::{anyhow, Context, Result};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::Deserialize;
use telemvault_protocol::{sha256_domain, CallbackProof, RequestId, DOMAIN_CALLBACK_PROOF_V1};

const ED25519_PUBLIC_KEY_LEN: usize = 32;
const ED25519_SIGNATURE_LEN: usize = 64;

#[derive(Debug, Deserialize)]
struct TrustedKeysFile {
    keys: BTreeMap<String, String>,
}

/// Oracle verification keys, keyed by the `key_id` callbacks carry.
#[derive(Debug, Default)]
pub struct TrustedOracleKeys {
    keys: BTreeMap<String, VerifyingKey>,
}

impl TrustedOracleKeys {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `{"keys": {"<key_id>": "<hex verifying key>", ...}}`.
    /// An empty key set is rejected: a vault with no trusted oracle
    /// keys can never process a callback.
    pub fn from_json(json: &[u8]) -> Result<Self> {
        let file: TrustedKeysFile =
            serde_json::from_slice(json).context("failed to parse trusted oracle keys")?;
        if file.keys.is_empty() {
            return Err(anyhow!("trusted key set must not be empty"));
        }
        let mut keys = BTreeMap::new();
        for (key_id, key_hex) in file.keys {
            let raw = hex::decode(&key_hex)
                .map_err(|_| anyhow!("trusted key {key_id} is not valid hex"))?;
            let raw: [u8; ED25519_PUBLIC_KEY_LEN] = raw
                .try_into()
                .map_err(|_| anyhow!("trusted key {key_id} must be {ED25519_PUBLIC_KEY_LEN} bytes"))?;
            let key = VerifyingKey::from_bytes(&raw)
                .map_err(|_| anyhow!("trusted key {key_id} is not a valid ed25519 key"))?;
            keys.insert(key_id, key);
        }
        Ok(Self { keys })
    }

    pub fn insert(&mut self, key_id: impl Into<String>, key: VerifyingKey) {
        self.keys.insert(key_id.into(), key);
    }

    #[must_use]
    pub fn get(&self, key_id: &str) -> Option<&VerifyingKey> {
        self.keys.get(key_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// The signed message: a domain hash binding payload bytes to one
/// exact request id, so a proof cannot be replayed against another
/// pending request.
#[must_use]
pub fn callback_digest(request_id: &RequestId, payload: &[u8]) -> [u8; 32] {
    let mut message = request_id.to_vec();
    message.extend_from_slice(payload);
    sha256_domain(DOMAIN_CALLBACK_PROOF_V1, &message)
}

pub fn verify_callback_proof(
    keys: &TrustedOracleKeys,
    request_id: &RequestId,
    payload: &[u8],
    proof: &CallbackProof,
) -> Result<()> {
    let key = keys
        .get(&proof.key_id)
        .ok_or_else(|| anyhow!("unknown oracle key id: {}", proof.key_id))?;
    let sig: [u8; ED25519_SIGNATURE_LEN] = proof
        .signature
        .as_slice()
        .try_into()
        .map_err(|_| anyhow!("signature must be {ED25519_SIGNATURE_LEN} bytes"))?;
    let signature = Signature::from_bytes(&sig);
    key.verify_strict(&callback_digest(request_id, payload), &signature)
        .map_err(|_| anyhow!("callback proof verification failed"))
}

/// Oracle-side counterpart, used by the loopback oracle and tests.
#[must_use]
pub fn sign_callback(
    signing_key: &SigningKey,
    key_id: impl Into<String>,
    request_id: &RequestId,
    payload: &[u8],
) -> CallbackProof {
    let signature = signing_key.sign(&callback_digest(request_id, payload));
    CallbackProof {
        key_id: key_id.into(),
        signature: signature.to_bytes().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> SigningKey {
        SigningKey::from_bytes(&[42; 32])
    }

    fn keys_with(key_id: &str, key: &SigningKey) -> TrustedOracleKeys {
        let mut keys = TrustedOracleKeys::new();
        keys.insert(key_id, key.verifying_key());
        keys
    }

    #[test]
    fn signed_proof_verifies() {
        let sk = test_key();
        let keys = keys_with("oracle-1", &sk);
        let request_id = [7; 32];
        let payload = [0, 0, 0, 0, 0, 0, 0, 99];

        let proof = sign_callback(&sk, "oracle-1", &request_id, &payload);
        verify_callback_proof(&keys, &request_id, &payload, &proof).expect("valid proof");
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let sk = test_key();
        let keys = keys_with("oracle-1", &sk);
        let request_id = [7; 32];

        let proof = sign_callback(&sk, "oracle-1", &request_id, &[0; 8]);
        let err = verify_callback_proof(&keys, &request_id, &[1; 8], &proof).expect_err("must fail");
        assert!(err.to_string().contains("verification failed"));
    }

    #[test]
    fn proof_is_bound_to_its_request_id() {
        let sk = test_key();
        let keys = keys_with("oracle-1", &sk);

        let proof = sign_callback(&sk, "oracle-1", &[7; 32], &[0; 8]);
        let err = verify_callback_proof(&keys, &[8; 32], &[0; 8], &proof).expect_err("must fail");
        assert!(err.to_string().contains("verification failed"));
    }

    #[test]
    fn unknown_key_id_is_rejected() {
        let sk = test_key();
        let keys = keys_with("oracle-1", &sk);

        let proof = sign_callback(&sk, "oracle-2", &[7; 32], &[0; 8]);
        let err = verify_callback_proof(&keys, &[7; 32], &[0; 8], &proof).expect_err("must fail");
        assert!(err.to_string().contains("unknown oracle key id"));
    }

    #[test]
    fn short_signature_is_rejected() {
        let sk = test_key();
        let keys = keys_with("oracle-1", &sk);
        let proof = CallbackProof {
            key_id: "oracle-1".to_string(),
            signature: vec![0; 63],
        };
        let err = verify_callback_proof(&keys, &[7; 32], &[0; 8], &proof).expect_err("must fail");
        assert!(err.to_string().contains("64 bytes"));
    }

    #[test]
    fn key_file_roundtrip() {
        let sk = test_key();
        let json = format!(
            r#"{{"keys":{{"oracle-1":"{}"}}}}"#,
            hex::encode(sk.verifying_key().to_bytes())
        );
        let keys = TrustedOracleKeys::from_json(json.as_bytes()).expect("keys");
        assert_eq!(keys.len(), 1);
        assert_eq!(keys.get("oracle-1"), Some(&sk.verifying_key()));
    }

    #[test]
    fn key_file_rejects_empty_and_malformed_sets() {
        let err = TrustedOracleKeys::from_json(br#"{"keys":{}}"#).expect_err("empty");
        assert!(err.to_string().contains("must not be empty"));

        let err = TrustedOracleKeys::from_json(br#"{"keys":{"k":"zz"}}"#).expect_err("hex");
        assert!(err.to_string().contains("not valid hex"));

        let err = TrustedOracleKeys::from_json(br#"{"keys":{"k":"0011"}}"#).expect_err("short");
        assert!(err.to_string().contains("32 bytes"));
    }
}
