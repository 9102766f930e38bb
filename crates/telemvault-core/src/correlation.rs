// Copyright (c) 2026 TelemVault Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::error::{RegistryError, RegistryResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use telemvault_protocol::{EquipmentHash, RecordId, RequestId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestPurpose {
    /// Per-record prediction decryption.
    Prediction,
    /// Aggregate-count decryption.
    Aggregate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrelationTarget {
    Record(RecordId),
    Equipment(EquipmentHash),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub target: CorrelationTarget,
    pub purpose: RequestPurpose,
}

/// Routes oracle callbacks back to the state that requested them.
/// `resolve` is lookup-and-remove: a request id can be consumed at
/// most once, which is what turns a replayed or forged callback into
/// a rejection rather than a state corruption.
#[derive(Debug, Default)]
pub struct CorrelationTable {
    pending: HashMap<RequestId, PendingRequest>,
}

impl CorrelationTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The oracle subsystem is trusted to generate unique ids, but
    /// the table still defends against replayed registration.
    pub fn register(
        &mut self,
        request_id: RequestId,
        target: CorrelationTarget,
        purpose: RequestPurpose,
    ) -> RegistryResult<()> {
        if self.pending.contains_key(&request_id) {
            return Err(RegistryError::DuplicateRequest);
        }
        self.pending
            .insert(request_id, PendingRequest { target, purpose });
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, request_id: &RequestId) -> bool {
        self.pending.contains_key(request_id)
    }

    /// Non-consuming lookup. Callers run proof verification and
    /// payload decoding against the peeked entry so a rejected
    /// callback leaves the pending request live.
    #[must_use]
    pub fn peek(&self, request_id: &RequestId) -> Option<PendingRequest> {
        self.pending.get(request_id).copied()
    }

    /// Atomic lookup-and-remove.
    pub fn resolve(&mut self, request_id: &RequestId) -> RegistryResult<PendingRequest> {
        self.pending
            .remove(request_id)
            .ok_or(RegistryError::UnknownRequest)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
