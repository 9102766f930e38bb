// Copyright (c) 2026 TelemVault Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::ciphertext::CiphertextHandle;
use crate::correlation::RequestPurpose;
use crate::error::RegistryResult;
use telemvault_protocol::{CallbackProof, RequestId};

/// Outbound seam to the external decryption oracle. Requesting is
/// fire-and-forget: the oracle answers later, out of band, through
/// the callback handler.
pub trait DecryptionOracle: Send + Sync {
    /// Hands ciphertexts to the oracle for off-band decryption and
    /// returns the correlation id it issued.
    fn request_decryption(
        &self,
        ciphertexts: &[CiphertextHandle],
        purpose: RequestPurpose,
    ) -> RegistryResult<RequestId>;
}

/// The oracle subsystem's attestation capability: does `proof`
/// authenticate `payload` for this exact `request_id`?
pub trait ProofVerifier: Send + Sync {
    fn verify(&self, request_id: &RequestId, payload: &[u8], proof: &CallbackProof) -> bool;
}
