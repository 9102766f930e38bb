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

use crate::aggregate::EquipmentLedger;
use crate::ciphertext::{CipherArithmetic, CiphertextHandle};
use crate::correlation::{CorrelationTable, CorrelationTarget, RequestPurpose};
use crate::error::{RegistryError, RegistryResult};
use crate::journal::{Journal, JournalEntry};
use crate::oracle::{DecryptionOracle, ProofVerifier};
use crate::record::{RecordState, RecordStore};
use parking_lot::Mutex;
use std::path::Path;
use telemvault_protocol::{
    decode_scalar_payload, equipment_hash, equipment_id_for_record, CallbackProof, RecordId,
    RequestId, SCALAR_PAYLOAD_LEN,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionReport {
    pub equipment_id: String,
    pub predicted_rul: u64,
    pub processed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackOutcome {
    pub record_id: RecordId,
    pub equipment_id: String,
    pub predicted_rul: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateReadout {
    pub equipment_id: String,
    pub count: u64,
}

struct RegistryState {
    records: RecordStore,
    pending: CorrelationTable,
    ledger: EquipmentLedger,
    journal: Journal,
}

/// The encrypted-telemetry registry. One mutex over all owned state
/// is the protocol's sole serialization point: two simultaneous
/// deliveries of the same callback see one successful application and
/// one `UnknownRequest` rejection.
///
/// Every operation validates everything fallible first and appends to
/// the journal as the single fallible commit step; the in-memory
/// application that follows cannot fail, so observable state changes
/// are all-or-nothing.
pub struct TelemetryRegistry {
    state: Mutex<RegistryState>,
    oracle: Box<dyn DecryptionOracle>,
    verifier: Box<dyn ProofVerifier>,
    cipher: Box<dyn CipherArithmetic>,
}

impl TelemetryRegistry {
    /// Opens the journal at `path` and replays it to rebuild the
    /// record store, correlation table, ledger, and index.
    pub fn open(
        path: impl AsRef<Path>,
        oracle: Box<dyn DecryptionOracle>,
        verifier: Box<dyn ProofVerifier>,
        cipher: Box<dyn CipherArithmetic>,
    ) -> RegistryResult<Self> {
        let (journal, entries) = Journal::open_or_create(path)?;
        let mut state = RegistryState {
            records: RecordStore::new(),
            pending: CorrelationTable::new(),
            ledger: EquipmentLedger::new(),
            journal,
        };
        for entry in entries {
            Self::replay_entry(&mut state, cipher.as_ref(), entry)?;
        }
        Ok(Self {
            state: Mutex::new(state),
            oracle,
            verifier,
            cipher,
        })
    }

    fn replay_entry(
        state: &mut RegistryState,
        cipher: &dyn CipherArithmetic,
        entry: JournalEntry,
    ) -> RegistryResult<()> {
        match entry {
            JournalEntry::Submitted {
                record_id,
                encrypted_temperature,
                encrypted_vibration,
                submitted_at,
            } => {
                if record_id != state.records.next_id() {
                    return Err(RegistryError::Internal(format!(
                        "journal replay: record id {record_id} breaks the dense sequence"
                    )));
                }
                state
                    .records
                    .submit(encrypted_temperature, encrypted_vibration, submitted_at);
                Ok(())
            }
            JournalEntry::PredictionRequested {
                request_id,
                record_id,
            } => {
                let record = state.records.get_mut(record_id)?;
                record.state = record.state.transition(RecordState::DecryptionRequested)?;
                state.pending.register(
                    request_id,
                    CorrelationTarget::Record(record_id),
                    RequestPurpose::Prediction,
                )
            }
            JournalEntry::AggregateRequested {
                request_id,
                equipment_hash,
            } => state.pending.register(
                request_id,
                CorrelationTarget::Equipment(equipment_hash),
                RequestPurpose::Aggregate,
            ),
            JournalEntry::PredictionResolved {
                request_id,
                record_id,
                predicted_rul,
            } => {
                let (equipment_id, new_count) =
                    Self::prepare_resolution(state, cipher, record_id)?;
                Self::commit_resolution(
                    state,
                    request_id,
                    record_id,
                    predicted_rul,
                    equipment_id,
                    new_count,
                )
                .map(|_| ())
            }
            JournalEntry::AggregateResolved { request_id }
            | JournalEntry::RequestAbandoned { request_id } => state
                .pending
                .resolve(&request_id)
                .map_err(|_| {
                    RegistryError::Internal(
                        "journal replay: consumed request id was never registered".to_string(),
                    )
                })
                .map(|_| ()),
        }
    }

    /// Fallible half of callback application: checks the record's
    /// lifecycle and computes the incremented aggregate without
    /// mutating anything. Must run before the journal append so a
    /// failing cipher backend cannot journal a resolution that was
    /// never applied.
    fn prepare_resolution(
        state: &RegistryState,
        cipher: &dyn CipherArithmetic,
        record_id: RecordId,
    ) -> RegistryResult<(String, CiphertextHandle)> {
        let equipment_id = equipment_id_for_record(record_id);

        let record_state = state
            .records
            .get(record_id)
            .map_err(|_| {
                RegistryError::Internal(format!(
                    "resolved request references missing record {record_id}"
                ))
            })?
            .state;
        record_state.transition(RecordState::Processed)?;

        let new_count = state.ledger.prepare_increment(&equipment_id, cipher)?;
        Ok((equipment_id, new_count))
    }

    /// Applies an already-journaled resolution. Shared by the live
    /// path and journal replay; failures here indicate state
    /// corruption.
    fn commit_resolution(
        state: &mut RegistryState,
        request_id: RequestId,
        record_id: RecordId,
        predicted_rul: u64,
        equipment_id: String,
        new_count: CiphertextHandle,
    ) -> RegistryResult<CallbackOutcome> {
        state.pending.resolve(&request_id).map_err(|_| {
            RegistryError::Internal("resolved request vanished from the table".to_string())
        })?;
        let record = state.records.get_mut(record_id).map_err(|_| {
            RegistryError::Internal(format!(
                "resolved request references missing record {record_id}"
            ))
        })?;
        record.state = RecordState::Processed;
        record.prediction.equipment_id = equipment_id.clone();
        record.prediction.predicted_rul = predicted_rul;
        record.prediction.processed = true;
        state.ledger.commit_increment(&equipment_id, new_count);

        Ok(CallbackOutcome {
            record_id,
            equipment_id,
            predicted_rul,
        })
    }

    /// Stores a new encrypted reading and its unprocessed prediction.
    /// Inputs are opaque handles; no validation of ciphertext content
    /// is possible or attempted.
    pub fn submit(
        &self,
        encrypted_temperature: CiphertextHandle,
        encrypted_vibration: CiphertextHandle,
    ) -> RegistryResult<RecordId> {
        let submitted_at = now_unix()?;
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let record_id = state.records.next_id();
        state.journal.append(&JournalEntry::Submitted {
            record_id,
            encrypted_temperature: encrypted_temperature.clone(),
            encrypted_vibration: encrypted_vibration.clone(),
            submitted_at,
        })?;
        state
            .records
            .submit(encrypted_temperature, encrypted_vibration, submitted_at);

        tracing::info!(record_id, "sensor reading submitted");
        Ok(record_id)
    }

    /// Read-only prediction view; zero/empty defaults until the
    /// record is processed.
    pub fn get_prediction(&self, record_id: RecordId) -> RegistryResult<PredictionReport> {
        let guard = self.state.lock();
        let record = guard.records.get(record_id)?;
        Ok(PredictionReport {
            equipment_id: record.prediction.equipment_id.clone(),
            predicted_rul: record.prediction.predicted_rul,
            processed: record.prediction.processed,
        })
    }

    pub fn record_state(&self, record_id: RecordId) -> RegistryResult<RecordState> {
        Ok(self.state.lock().records.get(record_id)?.state)
    }

    /// Equipment ids in first-seen order.
    #[must_use]
    pub fn equipment_index(&self) -> Vec<String> {
        self.state.lock().ledger.index().to_vec()
    }

    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Asks the oracle to decrypt the record's readings and registers
    /// the issued request id. Fire-and-forget: the answer arrives
    /// later through [`Self::process_callback`]. Retrying while a
    /// request is outstanding is allowed and issues a fresh id.
    pub fn request_prediction(&self, record_id: RecordId) -> RegistryResult<RequestId> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let record = state.records.get(record_id)?;
        if record.prediction.processed {
            return Err(RegistryError::AlreadyProcessed(record_id));
        }
        let next_state = record.state.transition(RecordState::DecryptionRequested)?;
        let ciphertexts = [
            record.encrypted_temperature.clone(),
            record.encrypted_vibration.clone(),
        ];

        let request_id = self
            .oracle
            .request_decryption(&ciphertexts, RequestPurpose::Prediction)?;
        if state.pending.contains(&request_id) {
            return Err(RegistryError::DuplicateRequest);
        }

        state.journal.append(&JournalEntry::PredictionRequested {
            request_id,
            record_id,
        })?;
        state
            .pending
            .register(
                request_id,
                CorrelationTarget::Record(record_id),
                RequestPurpose::Prediction,
            )
            .map_err(|_| {
                RegistryError::Internal("pending entry appeared during registration".to_string())
            })?;
        state.records.get_mut(record_id)?.state = next_state;

        tracing::info!(
            record_id,
            request_id = %hex::encode(request_id),
            "prediction requested"
        );
        Ok(request_id)
    }

    /// Applies an oracle callback exactly once.
    ///
    /// Resolution order: correlate, verify, decode, apply, aggregate.
    /// A replayed or forged callback fails before any mutation; a
    /// rejected callback leaves the pending entry live so the genuine
    /// delivery can still land.
    pub fn process_callback(
        &self,
        request_id: RequestId,
        payload: &[u8],
        proof: &CallbackProof,
    ) -> RegistryResult<CallbackOutcome> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let Some(pending) = state.pending.peek(&request_id) else {
            return Err(RegistryError::UnknownRequest);
        };
        let (CorrelationTarget::Record(record_id), RequestPurpose::Prediction) =
            (pending.target, pending.purpose)
        else {
            return Err(RegistryError::UnknownRequest);
        };

        if !self.verifier.verify(&request_id, payload, proof) {
            return Err(RegistryError::InvalidProof);
        }
        let predicted_rul = decode_scalar_payload(payload).ok_or_else(|| {
            RegistryError::MalformedPayload(format!(
                "expected {SCALAR_PAYLOAD_LEN} bytes, got {}",
                payload.len()
            ))
        })?;

        let record = state.records.get(record_id).map_err(|_| {
            RegistryError::Internal(format!(
                "pending request references missing record {record_id}"
            ))
        })?;
        if record.prediction.processed {
            // A sibling request already resolved this record; the
            // entry can never succeed, so drop it from the table.
            state
                .journal
                .append(&JournalEntry::RequestAbandoned { request_id })?;
            state.pending.resolve(&request_id).map_err(|_| {
                RegistryError::Internal("abandoned request vanished from the table".to_string())
            })?;
            tracing::warn!(
                record_id,
                request_id = %hex::encode(request_id),
                "abandoned pending request for already-processed record"
            );
            return Err(RegistryError::AlreadyProcessed(record_id));
        }

        let (equipment_id, new_count) =
            Self::prepare_resolution(state, self.cipher.as_ref(), record_id)?;
        state.journal.append(&JournalEntry::PredictionResolved {
            request_id,
            record_id,
            predicted_rul,
        })?;
        let outcome = Self::commit_resolution(
            state,
            request_id,
            record_id,
            predicted_rul,
            equipment_id,
            new_count,
        )?;

        tracing::info!(
            record_id,
            equipment_id = %outcome.equipment_id,
            predicted_rul,
            "prediction callback applied"
        );
        Ok(outcome)
    }

    /// Requests decryption of an equipment aggregate. The pending
    /// entry is keyed by the equipment-id hash because the callback
    /// path cannot carry a string.
    pub fn request_aggregate_decryption(&self, equipment_id: &str) -> RegistryResult<RequestId> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let count = state
            .ledger
            .count_ciphertext(equipment_id)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownEquipment(equipment_id.to_string()))?;

        let request_id = self
            .oracle
            .request_decryption(&[count], RequestPurpose::Aggregate)?;
        if state.pending.contains(&request_id) {
            return Err(RegistryError::DuplicateRequest);
        }

        let hash = equipment_hash(equipment_id);
        state.journal.append(&JournalEntry::AggregateRequested {
            request_id,
            equipment_hash: hash,
        })?;
        state
            .pending
            .register(
                request_id,
                CorrelationTarget::Equipment(hash),
                RequestPurpose::Aggregate,
            )
            .map_err(|_| {
                RegistryError::Internal("pending entry appeared during registration".to_string())
            })?;

        tracing::info!(
            equipment_id,
            request_id = %hex::encode(request_id),
            "aggregate decryption requested"
        );
        Ok(request_id)
    }

    /// Applies an aggregate-decryption callback: resolve, verify,
    /// decode, reverse the equipment hash. Consumes the pending entry;
    /// the aggregate itself stays encrypted.
    pub fn process_aggregate_callback(
        &self,
        request_id: RequestId,
        payload: &[u8],
        proof: &CallbackProof,
    ) -> RegistryResult<AggregateReadout> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let Some(pending) = state.pending.peek(&request_id) else {
            return Err(RegistryError::UnknownRequest);
        };
        let (CorrelationTarget::Equipment(hash), RequestPurpose::Aggregate) =
            (pending.target, pending.purpose)
        else {
            return Err(RegistryError::UnknownRequest);
        };

        if !self.verifier.verify(&request_id, payload, proof) {
            return Err(RegistryError::InvalidProof);
        }
        let count = decode_scalar_payload(payload).ok_or_else(|| {
            RegistryError::MalformedPayload(format!(
                "expected {SCALAR_PAYLOAD_LEN} bytes, got {}",
                payload.len()
            ))
        })?;

        let equipment_id = state.ledger.reverse_or_err(&hash)?;

        state
            .journal
            .append(&JournalEntry::AggregateResolved { request_id })?;
        state.pending.resolve(&request_id).map_err(|_| {
            RegistryError::Internal("resolved request vanished from the table".to_string())
        })?;

        tracing::info!(
            equipment_id = %equipment_id,
            count,
            "aggregate callback applied"
        );
        Ok(AggregateReadout {
            equipment_id,
            count,
        })
    }
}

fn now_unix() -> RegistryResult<u64> {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| RegistryError::Internal("system clock is before UNIX_EPOCH".to_string()))
}
