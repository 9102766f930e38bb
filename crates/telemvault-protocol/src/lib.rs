// Copyright [2026] [TelemVault Contributors]
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// Copyright (c) 2026 TelemVault Contributors
// SPDX-License-Identifier: Apache-2.0

//! telemvault-protocol
//!
//! Canonical wire contract shared by the TelemVault daemon, the
//! data-entry frontend, and the decryption oracle:
//! - protobuf service definition (`pb`)
//! - identifier aliases and the reserved `NO_RECORD` sentinel
//! - domain-separated hashing and the callback proof shape
//! - equipment-id derivation and equipment hashing
//! - the fixed-width scalar callback payload codec

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

pub mod pb {
    tonic::include_proto!("telemvault.v1");
}

/// Record identifiers are dense, gapless, and 1-based.
pub type RecordId = u64;

/// Correlation id issued by the oracle subsystem for one outstanding
/// decryption request.
pub type RequestId = [u8; 32];

/// Content hash standing in for an equipment id on the aggregate
/// callback path, which cannot carry a string.
pub type EquipmentHash = [u8; 32];

/// Reserved record id denoting "absent". Never issued.
pub const NO_RECORD: RecordId = 0;

pub const PROTOCOL_SEMVER: &str = "1.0.0";

pub const DOMAIN_CALLBACK_PROOF_V1: &[u8] = b"telemvault:callback_proof:v1";
pub const DOMAIN_EQUIPMENT_HASH_V1: &[u8] = b"telemvault:equipment_hash:v1";
pub const DOMAIN_REQUEST_ID_V1: &[u8] = b"telemvault:request_id:v1";

/// Equipment identity is derived from submission order, not from any
/// sensor-reported identity.
pub const EQUIPMENT_ID_PREFIX: &str = "EQ-";

/// A decrypted scalar crosses the callback boundary as exactly this
/// many big-endian bytes.
pub const SCALAR_PAYLOAD_LEN: usize = 8;

/// Returns `SHA256(domain || payload)`.
///
/// This construction is a consensus-critical interface shared by the
/// daemon, the oracle, and clients. Do not modify without a
/// coordinated protocol version bump.
#[must_use]
pub fn sha256_domain(domain: &[u8], payload: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update(payload);

    let digest = hasher.finalize();
    let mut out = [0_u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Attestation accompanying an oracle callback: an ed25519 signature
/// by the named oracle authority over the domain-separated digest of
/// `request_id || payload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackProof {
    pub key_id: String,
    pub signature: Vec<u8>,
}

#[must_use]
pub fn equipment_id_for_record(record_id: RecordId) -> String {
    format!("{EQUIPMENT_ID_PREFIX}{record_id}")
}

#[must_use]
pub fn equipment_hash(equipment_id: &str) -> EquipmentHash {
    sha256_domain(DOMAIN_EQUIPMENT_HASH_V1, equipment_id.as_bytes())
}

#[must_use]
pub fn encode_scalar_payload(value: u64) -> [u8; SCALAR_PAYLOAD_LEN] {
    value.to_be_bytes()
}

/// Decodes a scalar callback payload. Returns `None` unless the
/// payload is exactly [`SCALAR_PAYLOAD_LEN`] bytes.
#[must_use]
pub fn decode_scalar_payload(payload: &[u8]) -> Option<u64> {
    let bytes: [u8; SCALAR_PAYLOAD_LEN] = payload.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}
