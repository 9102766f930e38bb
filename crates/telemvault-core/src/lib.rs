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

//! telemvault-core
//!
//! The encrypted-telemetry registry core: a small, precise state
//! machine over asynchronous, untrusted, possibly-delayed oracle
//! callbacks.
//!
//! This crate implements the core protocol invariants:
//! - Record Store (dense 1-based ids, 0 reserved as "no record")
//! - Request Correlation Table (at-most-once callback consumption)
//! - Decryption Callback Handler (verify, decode, apply exactly once)
//! - Equipment Aggregate Ledger + Index (lazy encrypted counters)
//! - Append-only journal for durable state reconstruction

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod aggregate;
pub mod ciphertext;
pub mod correlation;
pub mod error;
pub mod journal;
pub mod oracle;
pub mod record;
pub mod registry;

pub use crate::ciphertext::{CipherArithmetic, CiphertextHandle, DevTallyCipher};
pub use crate::correlation::RequestPurpose;
pub use crate::error::{RegistryError, RegistryResult};
pub use crate::oracle::{DecryptionOracle, ProofVerifier};
pub use crate::record::RecordState;
pub use crate::registry::{
    AggregateReadout, CallbackOutcome, PredictionReport, TelemetryRegistry,
};
