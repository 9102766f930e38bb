// Copyright (c) 2026 TelemVault Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::ciphertext::CiphertextHandle;
use crate::error::{RegistryError, RegistryResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use telemvault_protocol::{RecordId, NO_RECORD};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordState {
    Submitted,
    DecryptionRequested,
    Processed,
}

impl RecordState {
    /// Checked lifecycle transition. `DecryptionRequested` may
    /// re-enter itself (a caller retrying a prediction request);
    /// `Processed` is terminal.
    pub fn transition(self, to: RecordState) -> RegistryResult<RecordState> {
        match (self, to) {
            (RecordState::Submitted, RecordState::DecryptionRequested)
            | (RecordState::DecryptionRequested, RecordState::DecryptionRequested)
            | (RecordState::DecryptionRequested, RecordState::Processed) => Ok(to),
            (from, target) => Err(RegistryError::Internal(format!(
                "invalid record state transition {from:?} -> {target:?}"
            ))),
        }
    }
}

/// The 1:1 companion of a [`SensorRecord`]. Empty/zero until the
/// callback handler resolves it, then immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Prediction {
    pub equipment_id: String,
    pub predicted_rul: u64,
    pub processed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorRecord {
    pub id: RecordId,
    pub encrypted_temperature: CiphertextHandle,
    pub encrypted_vibration: CiphertextHandle,
    pub submitted_at: u64,
    pub state: RecordState,
    pub prediction: Prediction,
}

/// Exclusive owner of all SensorRecord/Prediction pairs. Ids are a
/// dense, gapless, 1-based sequence; records are never deleted.
#[derive(Debug)]
pub struct RecordStore {
    records: BTreeMap<RecordId, SensorRecord>,
    next_id: RecordId,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// The id the next submission will receive.
    #[must_use]
    pub fn next_id(&self) -> RecordId {
        self.next_id
    }

    /// Stores a new reading. No validation of ciphertext content is
    /// possible or attempted.
    pub fn submit(
        &mut self,
        encrypted_temperature: CiphertextHandle,
        encrypted_vibration: CiphertextHandle,
        submitted_at: u64,
    ) -> RecordId {
        let id = self.next_id;
        self.next_id += 1;
        self.records.insert(
            id,
            SensorRecord {
                id,
                encrypted_temperature,
                encrypted_vibration,
                submitted_at,
                state: RecordState::Submitted,
                prediction: Prediction::default(),
            },
        );
        id
    }

    pub fn get(&self, id: RecordId) -> RegistryResult<&SensorRecord> {
        if id == NO_RECORD {
            return Err(RegistryError::NotFound(id));
        }
        self.records.get(&id).ok_or(RegistryError::NotFound(id))
    }

    pub fn get_mut(&mut self, id: RecordId) -> RegistryResult<&mut SensorRecord> {
        if id == NO_RECORD {
            return Err(RegistryError::NotFound(id));
        }
        self.records.get_mut(&id).ok_or(RegistryError::NotFound(id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
