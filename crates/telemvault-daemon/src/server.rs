#![allow(clippy::result_large_err)]

// Copyright (c) 2026 TelemVault Contributors
// SPDX-License-Identifier: Apache-2.0

use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;

use tonic::{Code, Request, Response, Status};

use telemvault_core::{CiphertextHandle, TelemetryRegistry};
use telemvault_protocol::{pb, CallbackProof, RequestId};

use crate::config::DaemonConfig;
use crate::oracle_client::{AttestVerifier, DevTallyCipher, LoopbackOracle};
use crate::public_error::{public_status, registry_status, PublicErrorCode};

use pb::telemetry_vault_server::TelemetryVault;

const LOCK_FILE_NAME: &str = "vault.lock";
const JOURNAL_FILE_NAME: &str = "journal.log";

struct VaultState {
    registry: TelemetryRegistry,
    data_path: PathBuf,
    // Held open for the service's lifetime; the file on disk marks
    // single-writer ownership of the data dir.
    _lock_file: File,
}

impl Drop for VaultState {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(self.data_path.join(LOCK_FILE_NAME));
    }
}

#[derive(Clone)]
pub struct TelemetryVaultService {
    state: Arc<VaultState>,
}

impl std::fmt::Debug for TelemetryVaultService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryVaultService")
            .field("data_path", &self.state.data_path)
            .finish_non_exhaustive()
    }
}

impl TelemetryVaultService {
    pub fn build(config: DaemonConfig) -> Result<Self, Status> {
        let root = config.data_dir.clone();
        std::fs::create_dir_all(&root).map_err(|_| Status::internal("mkdir failed"))?;

        // Single-writer guard: a second daemon on the same data dir
        // would interleave journal appends.
        let lock_path = root.join(LOCK_FILE_NAME);
        let lock_file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&lock_path)
            .map_err(|_| Status::failed_precondition("another writer already holds vault lock"))?;

        let registry = TelemetryRegistry::open(
            root.join(JOURNAL_FILE_NAME),
            Box::new(LoopbackOracle::new()),
            Box::new(AttestVerifier::new(config.trusted_keys)),
            Box::new(DevTallyCipher),
        )
        .map_err(|e| registry_status(&e))?;

        Ok(Self {
            state: Arc::new(VaultState {
                registry,
                data_path: root,
                _lock_file: lock_file,
            }),
        })
    }
}

fn parse_request_id(bytes: &[u8]) -> Result<RequestId, Status> {
    bytes.try_into().map_err(|_| {
        public_status(Code::InvalidArgument, PublicErrorCode::InvalidInput)
    })
}

fn parse_proof(proof: Option<pb::CallbackProof>) -> Result<CallbackProof, Status> {
    let proof = proof.ok_or_else(|| {
        public_status(Code::InvalidArgument, PublicErrorCode::InvalidInput)
    })?;
    Ok(CallbackProof {
        key_id: proof.key_id,
        signature: proof.signature,
    })
}

#[tonic::async_trait]
impl TelemetryVault for TelemetryVaultService {
    async fn health(
        &self,
        _request: Request<pb::HealthRequest>,
    ) -> Result<Response<pb::HealthResponse>, Status> {
        Ok(Response::new(pb::HealthResponse {
            status: "SERVING".to_string(),
        }))
    }

    async fn submit(
        &self,
        request: Request<pb::SubmitRequest>,
    ) -> Result<Response<pb::SubmitResponse>, Status> {
        let req = request.into_inner();
        // Ciphertexts are opaque; nothing about their content (or
        // length) can be validated here.
        let record_id = self
            .state
            .registry
            .submit(
                CiphertextHandle::new(req.encrypted_temperature),
                CiphertextHandle::new(req.encrypted_vibration),
            )
            .map_err(|e| registry_status(&e))?;
        Ok(Response::new(pb::SubmitResponse { record_id }))
    }

    async fn request_prediction(
        &self,
        request: Request<pb::RequestPredictionRequest>,
    ) -> Result<Response<pb::RequestPredictionResponse>, Status> {
        let req = request.into_inner();
        let request_id = self
            .state
            .registry
            .request_prediction(req.record_id)
            .map_err(|e| registry_status(&e))?;
        Ok(Response::new(pb::RequestPredictionResponse {
            request_id: request_id.to_vec(),
        }))
    }

    async fn get_prediction(
        &self,
        request: Request<pb::GetPredictionRequest>,
    ) -> Result<Response<pb::GetPredictionResponse>, Status> {
        let req = request.into_inner();
        let report = self
            .state
            .registry
            .get_prediction(req.record_id)
            .map_err(|e| registry_status(&e))?;
        Ok(Response::new(pb::GetPredictionResponse {
            equipment_id: report.equipment_id,
            predicted_rul: report.predicted_rul,
            processed: report.processed,
        }))
    }

    async fn process_callback(
        &self,
        request: Request<pb::ProcessCallbackRequest>,
    ) -> Result<Response<pb::ProcessCallbackResponse>, Status> {
        let req = request.into_inner();
        let request_id = parse_request_id(&req.request_id)?;
        let proof = parse_proof(req.proof)?;

        let outcome = self
            .state
            .registry
            .process_callback(request_id, &req.payload, &proof)
            .map_err(|e| registry_status(&e))?;
        Ok(Response::new(pb::ProcessCallbackResponse {
            record_id: outcome.record_id,
            equipment_id: outcome.equipment_id,
            predicted_rul: outcome.predicted_rul,
        }))
    }

    async fn request_aggregate_decryption(
        &self,
        request: Request<pb::RequestAggregateDecryptionRequest>,
    ) -> Result<Response<pb::RequestAggregateDecryptionResponse>, Status> {
        let req = request.into_inner();
        let request_id = self
            .state
            .registry
            .request_aggregate_decryption(&req.equipment_id)
            .map_err(|e| registry_status(&e))?;
        Ok(Response::new(pb::RequestAggregateDecryptionResponse {
            request_id: request_id.to_vec(),
        }))
    }

    async fn process_aggregate_callback(
        &self,
        request: Request<pb::ProcessAggregateCallbackRequest>,
    ) -> Result<Response<pb::ProcessAggregateCallbackResponse>, Status> {
        let req = request.into_inner();
        let request_id = parse_request_id(&req.request_id)?;
        let proof = parse_proof(req.proof)?;

        let readout = self
            .state
            .registry
            .process_aggregate_callback(request_id, &req.payload, &proof)
            .map_err(|e| registry_status(&e))?;
        Ok(Response::new(pb::ProcessAggregateCallbackResponse {
            equipment_id: readout.equipment_id,
            count: readout.count,
        }))
    }
}
