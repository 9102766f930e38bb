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

use crate::ciphertext::CiphertextHandle;
use crate::error::{RegistryError, RegistryResult};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use telemvault_protocol::{EquipmentHash, RecordId, RequestId};

/// One durable state transition. The journal is the registry's only
/// persistence: replaying the entries in order rebuilds the record
/// store, the correlation table, the aggregate ledger, and the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalEntry {
    Submitted {
        record_id: RecordId,
        encrypted_temperature: CiphertextHandle,
        encrypted_vibration: CiphertextHandle,
        submitted_at: u64,
    },
    PredictionRequested {
        request_id: RequestId,
        record_id: RecordId,
    },
    AggregateRequested {
        request_id: RequestId,
        equipment_hash: EquipmentHash,
    },
    PredictionResolved {
        request_id: RequestId,
        record_id: RecordId,
        predicted_rul: u64,
    },
    AggregateResolved {
        request_id: RequestId,
    },
    /// A pending entry that can never resolve (its record was
    /// processed through a sibling request id).
    RequestAbandoned {
        request_id: RequestId,
    },
}

/// Append-only, length-prefixed (u32 LE) log of serde-JSON entries.
#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    file: File,
    entries: u64,
}

impl Journal {
    /// Opens or creates the journal and returns it together with every
    /// entry already on disk, in append order.
    pub fn open_or_create(path: impl AsRef<Path>) -> RegistryResult<(Self, Vec<JournalEntry>)> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|e| RegistryError::Internal(format!("journal open failed: {e}")))?;

        let mut entries = Vec::new();
        let mut reader = BufReader::new(
            OpenOptions::new()
                .read(true)
                .open(&path)
                .map_err(|e| RegistryError::Internal(format!("journal open failed: {e}")))?,
        );
        loop {
            let mut len_bytes = [0_u8; 4];
            match reader.read_exact(&mut len_bytes) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => {
                    return Err(RegistryError::Internal(format!("journal read failed: {e}")))
                }
            }
            let len = u32::from_le_bytes(len_bytes) as usize;
            let mut data = vec![0_u8; len];
            reader
                .read_exact(&mut data)
                .map_err(|e| RegistryError::Internal(format!("journal truncated: {e}")))?;
            let entry: JournalEntry = serde_json::from_slice(&data)
                .map_err(|e| RegistryError::Internal(format!("journal entry corrupt: {e}")))?;
            entries.push(entry);
        }

        let journal = Self {
            path,
            file,
            entries: entries.len() as u64,
        };
        Ok((journal, entries))
    }

    /// Durably appends one entry. Callers append *before* mutating
    /// in-memory state so a failed write leaves nothing half-applied.
    pub fn append(&mut self, entry: &JournalEntry) -> RegistryResult<()> {
        let data = serde_json::to_vec(entry)
            .map_err(|e| RegistryError::Internal(format!("journal encode failed: {e}")))?;
        let len = u32::try_from(data.len())
            .map_err(|_| RegistryError::Internal("journal entry too large".to_string()))?;
        self.file
            .write_all(&len.to_le_bytes())
            .and_then(|()| self.file.write_all(&data))
            .and_then(|()| self.file.flush())
            .map_err(|e| RegistryError::Internal(format!("journal append failed: {e}")))?;
        self.entries += 1;
        Ok(())
    }

    #[must_use]
    pub fn entries(&self) -> u64 {
        self.entries
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
