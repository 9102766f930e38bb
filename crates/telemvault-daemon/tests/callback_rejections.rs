use std::net::SocketAddr;
use std::path::Path;

use ed25519_dalek::SigningKey;
use telemvault_attest::{sign_callback, TrustedOracleKeys};
use telemvault_daemon::config::DaemonConfig;
use telemvault_daemon::public_error::PUBLIC_ERROR_METADATA_KEY;
use telemvault_daemon::server::TelemetryVaultService;
use telemvault_protocol::pb;
use telemvault_protocol::pb::telemetry_vault_client::TelemetryVaultClient;
use telemvault_protocol::pb::telemetry_vault_server::TelemetryVaultServer;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Channel, Server};
use tonic::{Code, Status};

const ORACLE_KEY_ID: &str = "oracle-dev";

fn oracle_key() -> SigningKey {
    SigningKey::from_bytes(&[7; 32])
}

async fn start_server(data_dir: &Path) -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let mut keys = TrustedOracleKeys::new();
    keys.insert(ORACLE_KEY_ID, oracle_key().verifying_key());
    let svc = TelemetryVaultService::build(DaemonConfig {
        data_dir: data_dir.to_path_buf(),
        trusted_keys: keys,
    })
    .expect("service");

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let incoming = TcpListenerStream::new(listener);
    let handle = tokio::spawn(async move {
        Server::builder()
            .add_service(TelemetryVaultServer::new(svc))
            .serve_with_incoming(incoming)
            .await
            .expect("server run");
    });
    (addr, handle)
}

async fn client(addr: SocketAddr) -> TelemetryVaultClient<Channel> {
    TelemetryVaultClient::connect(format!("http://{addr}"))
        .await
        .expect("connect")
}

fn signed_proof(request_id: &[u8], payload: &[u8]) -> pb::CallbackProof {
    let request_id: [u8; 32] = request_id.try_into().expect("32-byte request id");
    let proof = sign_callback(&oracle_key(), ORACLE_KEY_ID, &request_id, payload);
    pb::CallbackProof {
        key_id: proof.key_id,
        signature: proof.signature,
    }
}

fn public_code(status: &Status) -> Option<&str> {
    status
        .metadata()
        .get(PUBLIC_ERROR_METADATA_KEY)
        .and_then(|v| v.to_str().ok())
}

async fn submitted_and_requested(c: &mut TelemetryVaultClient<Channel>) -> (u64, Vec<u8>) {
    let record_id = c
        .submit(pb::SubmitRequest {
            encrypted_temperature: vec![9; 24],
            encrypted_vibration: vec![10; 24],
        })
        .await
        .expect("submit")
        .into_inner()
        .record_id;
    let request_id = c
        .request_prediction(pb::RequestPredictionRequest { record_id })
        .await
        .expect("request")
        .into_inner()
        .request_id;
    (record_id, request_id)
}

#[tokio::test]
async fn submit_accepts_any_ciphertext_bytes() {
    let dir = TempDir::new().expect("tmp");
    let (addr, _handle) = start_server(dir.path()).await;
    let mut c = client(addr).await;

    // Ciphertexts are opaque to the vault: even empty bytes are stored
    // as-is rather than rejected.
    let record_id = c
        .submit(pb::SubmitRequest {
            encrypted_temperature: Vec::new(),
            encrypted_vibration: vec![1; 8],
        })
        .await
        .expect("submit")
        .into_inner()
        .record_id;
    assert_eq!(record_id, 1);

    let report = c
        .get_prediction(pb::GetPredictionRequest { record_id })
        .await
        .expect("get")
        .into_inner();
    assert!(!report.processed);
}

#[tokio::test]
async fn prediction_requests_for_missing_records_are_not_found() {
    let dir = TempDir::new().expect("tmp");
    let (addr, _handle) = start_server(dir.path()).await;
    let mut c = client(addr).await;

    for record_id in [0, 7] {
        let err = c
            .request_prediction(pb::RequestPredictionRequest { record_id })
            .await
            .expect_err("must fail");
        assert_eq!(err.code(), Code::NotFound);
        assert_eq!(public_code(&err), Some("NOT_FOUND"));
    }
}

#[tokio::test]
async fn duplicate_callback_is_rejected_with_unknown_request() {
    let dir = TempDir::new().expect("tmp");
    let (addr, _handle) = start_server(dir.path()).await;
    let mut c = client(addr).await;

    let (_, request_id) = submitted_and_requested(&mut c).await;
    let payload = 55_u64.to_be_bytes().to_vec();
    let req = pb::ProcessCallbackRequest {
        request_id: request_id.clone(),
        payload: payload.clone(),
        proof: Some(signed_proof(&request_id, &payload)),
    };

    c.process_callback(req.clone()).await.expect("first delivery");
    let err = c.process_callback(req).await.expect_err("replay");
    assert_eq!(err.code(), Code::NotFound);
    assert_eq!(public_code(&err), Some("UNKNOWN_REQUEST"));
}

#[tokio::test]
async fn forged_proof_is_rejected_and_request_stays_live() {
    let dir = TempDir::new().expect("tmp");
    let (addr, _handle) = start_server(dir.path()).await;
    let mut c = client(addr).await;

    let (record_id, request_id) = submitted_and_requested(&mut c).await;
    let payload = 55_u64.to_be_bytes().to_vec();

    let err = c
        .process_callback(pb::ProcessCallbackRequest {
            request_id: request_id.clone(),
            payload: payload.clone(),
            proof: Some(pb::CallbackProof {
                key_id: ORACLE_KEY_ID.to_string(),
                signature: vec![0; 64],
            }),
        })
        .await
        .expect_err("forged");
    assert_eq!(err.code(), Code::Unauthenticated);
    assert_eq!(public_code(&err), Some("UNAUTHORIZED"));

    // The genuine delivery still succeeds afterwards.
    let outcome = c
        .process_callback(pb::ProcessCallbackRequest {
            request_id: request_id.clone(),
            payload: payload.clone(),
            proof: Some(signed_proof(&request_id, &payload)),
        })
        .await
        .expect("genuine delivery")
        .into_inner();
    assert_eq!(outcome.record_id, record_id);
}

#[tokio::test]
async fn malformed_payload_is_invalid_input() {
    let dir = TempDir::new().expect("tmp");
    let (addr, _handle) = start_server(dir.path()).await;
    let mut c = client(addr).await;

    let (_, request_id) = submitted_and_requested(&mut c).await;
    let short_payload = vec![0; 7];

    let err = c
        .process_callback(pb::ProcessCallbackRequest {
            request_id: request_id.clone(),
            // Correctly signed, wrong shape.
            proof: Some(signed_proof(&request_id, &short_payload)),
            payload: short_payload,
        })
        .await
        .expect_err("must fail");
    assert_eq!(err.code(), Code::InvalidArgument);
    assert_eq!(public_code(&err), Some("INVALID_INPUT"));
}

#[tokio::test]
async fn wrong_length_request_id_is_invalid_input() {
    let dir = TempDir::new().expect("tmp");
    let (addr, _handle) = start_server(dir.path()).await;
    let mut c = client(addr).await;

    let payload = 1_u64.to_be_bytes().to_vec();
    let err = c
        .process_callback(pb::ProcessCallbackRequest {
            request_id: vec![1; 16],
            payload,
            proof: Some(pb::CallbackProof {
                key_id: ORACLE_KEY_ID.to_string(),
                signature: vec![0; 64],
            }),
        })
        .await
        .expect_err("must fail");
    assert_eq!(err.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn missing_proof_is_invalid_input() {
    let dir = TempDir::new().expect("tmp");
    let (addr, _handle) = start_server(dir.path()).await;
    let mut c = client(addr).await;

    let (_, request_id) = submitted_and_requested(&mut c).await;
    let err = c
        .process_callback(pb::ProcessCallbackRequest {
            request_id,
            payload: 1_u64.to_be_bytes().to_vec(),
            proof: None,
        })
        .await
        .expect_err("must fail");
    assert_eq!(err.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn rerequesting_a_processed_record_is_a_failed_precondition() {
    let dir = TempDir::new().expect("tmp");
    let (addr, _handle) = start_server(dir.path()).await;
    let mut c = client(addr).await;

    let (record_id, request_id) = submitted_and_requested(&mut c).await;
    let payload = 55_u64.to_be_bytes().to_vec();
    c.process_callback(pb::ProcessCallbackRequest {
        request_id: request_id.clone(),
        payload: payload.clone(),
        proof: Some(signed_proof(&request_id, &payload)),
    })
    .await
    .expect("callback");

    let err = c
        .request_prediction(pb::RequestPredictionRequest { record_id })
        .await
        .expect_err("must fail");
    assert_eq!(err.code(), Code::FailedPrecondition);
    assert_eq!(public_code(&err), Some("ALREADY_PROCESSED"));
}

#[tokio::test]
async fn prediction_request_id_cannot_resolve_an_aggregate_callback() {
    let dir = TempDir::new().expect("tmp");
    let (addr, _handle) = start_server(dir.path()).await;
    let mut c = client(addr).await;

    let (_, request_id) = submitted_and_requested(&mut c).await;
    let payload = 1_u64.to_be_bytes().to_vec();

    let err = c
        .process_aggregate_callback(pb::ProcessAggregateCallbackRequest {
            request_id: request_id.clone(),
            payload: payload.clone(),
            proof: Some(signed_proof(&request_id, &payload)),
        })
        .await
        .expect_err("purpose mismatch");
    assert_eq!(err.code(), Code::NotFound);
    assert_eq!(public_code(&err), Some("UNKNOWN_REQUEST"));

    // Unharmed by the mismatch, the prediction path still works.
    let rul = 55_u64.to_be_bytes().to_vec();
    c.process_callback(pb::ProcessCallbackRequest {
        request_id: request_id.clone(),
        payload: rul.clone(),
        proof: Some(signed_proof(&request_id, &rul)),
    })
    .await
    .expect("prediction callback");
}
