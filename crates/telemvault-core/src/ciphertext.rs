// Copyright (c) 2026 TelemVault Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::error::{RegistryError, RegistryResult};
use core::fmt;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An opaque encrypted value. The core stores, compares, and forwards
/// handles but can never read cleartext through one.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CiphertextHandle(Vec<u8>);

impl CiphertextHandle {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = &self.0[..self.0.len().min(8)];
        write!(f, "CiphertextHandle({}.., {} bytes)", hex::encode(head), self.0.len())
    }
}

impl Serialize for CiphertextHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for CiphertextHandle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(&encoded).map_err(serde::de::Error::custom)?;
        Ok(Self(bytes))
    }
}

/// Homomorphic arithmetic over ciphertext handles, supplied by the
/// embedding encryption library. The core treats it as an opaque
/// capability and never implements the arithmetic itself.
pub trait CipherArithmetic: Send + Sync {
    /// A ciphertext encrypting zero, used to initialize aggregates.
    fn encrypted_zero(&self) -> CiphertextHandle;

    /// Homomorphically adds one encrypted unit to `count`.
    fn add_one(&self, count: &CiphertextHandle) -> RegistryResult<CiphertextHandle>;
}

const TALLY_MASK: u8 = 0xa5;

/// Development stand-in for [`CipherArithmetic`]. The "ciphertext" is
/// a masked big-endian counter; this is obfuscation, not encryption,
/// and exists so the registry can run end to end without an FHE
/// backend. Production deployments supply their own implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct DevTallyCipher;

impl DevTallyCipher {
    fn decode_inner(count: &CiphertextHandle) -> Option<u64> {
        let bytes: [u8; 8] = count.as_bytes().try_into().ok()?;
        let mut unmasked = [0_u8; 8];
        for (out, b) in unmasked.iter_mut().zip(bytes.iter()) {
            *out = b ^ TALLY_MASK;
        }
        Some(u64::from_be_bytes(unmasked))
    }

    fn encode_inner(value: u64) -> CiphertextHandle {
        let mut bytes = value.to_be_bytes();
        for b in &mut bytes {
            *b ^= TALLY_MASK;
        }
        CiphertextHandle::new(bytes.to_vec())
    }

    /// Reads the tally back out. Only meaningful for handles this
    /// backend produced; the dev loopback oracle and tests use it to
    /// play the decrypting side.
    #[must_use]
    pub fn decode(count: &CiphertextHandle) -> Option<u64> {
        Self::decode_inner(count)
    }
}

impl CipherArithmetic for DevTallyCipher {
    fn encrypted_zero(&self) -> CiphertextHandle {
        Self::encode_inner(0)
    }

    fn add_one(&self, count: &CiphertextHandle) -> RegistryResult<CiphertextHandle> {
        let value = Self::decode_inner(count).ok_or_else(|| {
            RegistryError::Internal("aggregate ciphertext has foreign shape".to_string())
        })?;
        let next = value.checked_add(1).ok_or_else(|| {
            RegistryError::Internal("aggregate counter overflow".to_string())
        })?;
        Ok(Self::encode_inner(next))
    }
}
