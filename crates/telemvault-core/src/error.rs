use telemvault_protocol::RecordId;
use thiserror::Error;

pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no such record: {0}")]
    NotFound(RecordId),

    #[error("record {0} already processed")]
    AlreadyProcessed(RecordId),

    #[error("request id already registered")]
    DuplicateRequest,

    #[error("unknown or already consumed request id")]
    UnknownRequest,

    #[error("callback proof verification failed")]
    InvalidProof,

    #[error("malformed callback payload: {0}")]
    MalformedPayload(String),

    #[error("no aggregate exists for equipment id `{0}`")]
    UnknownEquipment(String),

    #[error("equipment hash matches no known equipment id")]
    EquipmentNotFound,

    /// State corruption, not caller misuse. Reported and logged,
    /// never a panic.
    #[error("internal invariant violation: {0}")]
    Internal(String),
}
