use telemvault_core::RegistryError;
use tonic::{metadata::MetadataValue, Code, Status};

pub const PUBLIC_ERROR_METADATA_KEY: &str = "x-telemvault-public-error-code";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicErrorCode {
    InvalidInput,
    Unauthorized,
    NotFound,
    AlreadyProcessed,
    DuplicateRequest,
    UnknownRequest,
    Internal,
}

impl PublicErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "INVALID_INPUT",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyProcessed => "ALREADY_PROCESSED",
            Self::DuplicateRequest => "DUPLICATE_REQUEST",
            Self::UnknownRequest => "UNKNOWN_REQUEST",
            Self::Internal => "INTERNAL",
        }
    }
}

/// Messages stay generic; the machine-readable code travels in
/// metadata so error details never leak registry internals.
pub fn public_status(grpc_code: Code, public_code: PublicErrorCode) -> Status {
    let message = match grpc_code {
        Code::InvalidArgument => "invalid request",
        Code::Unauthenticated => "authentication failed",
        Code::NotFound => "resource not found",
        Code::FailedPrecondition => "operation blocked by registry state",
        Code::AlreadyExists => "request already pending",
        _ => "internal error",
    };
    let mut status = Status::new(grpc_code, message);
    status.metadata_mut().insert(
        PUBLIC_ERROR_METADATA_KEY,
        MetadataValue::from_static(public_code.as_str()),
    );
    status
}

pub fn registry_status(err: &RegistryError) -> Status {
    match err {
        RegistryError::NotFound(_)
        | RegistryError::UnknownEquipment(_)
        | RegistryError::EquipmentNotFound => {
            public_status(Code::NotFound, PublicErrorCode::NotFound)
        }
        RegistryError::AlreadyProcessed(_) => {
            public_status(Code::FailedPrecondition, PublicErrorCode::AlreadyProcessed)
        }
        RegistryError::DuplicateRequest => {
            public_status(Code::AlreadyExists, PublicErrorCode::DuplicateRequest)
        }
        RegistryError::UnknownRequest => {
            public_status(Code::NotFound, PublicErrorCode::UnknownRequest)
        }
        RegistryError::InvalidProof => {
            public_status(Code::Unauthenticated, PublicErrorCode::Unauthorized)
        }
        RegistryError::MalformedPayload(_) => {
            public_status(Code::InvalidArgument, PublicErrorCode::InvalidInput)
        }
        RegistryError::Internal(detail) => {
            tracing::error!(%detail, "internal registry error");
            public_status(Code::Internal, PublicErrorCode::Internal)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_carries_the_public_code() {
        let status = registry_status(&RegistryError::UnknownRequest);
        assert_eq!(status.code(), Code::NotFound);
        assert_eq!(
            status
                .metadata()
                .get(PUBLIC_ERROR_METADATA_KEY)
                .and_then(|v| v.to_str().ok()),
            Some("UNKNOWN_REQUEST")
        );
    }

    #[test]
    fn internal_details_never_reach_the_message() {
        let status = registry_status(&RegistryError::Internal("journal append failed".into()));
        assert_eq!(status.code(), Code::Internal);
        assert_eq!(status.message(), "internal error");
    }

    #[test]
    fn registry_errors_map_to_distinct_codes() {
        assert_eq!(
            registry_status(&RegistryError::NotFound(7)).code(),
            Code::NotFound
        );
        assert_eq!(
            registry_status(&RegistryError::AlreadyProcessed(7)).code(),
            Code::FailedPrecondition
        );
        assert_eq!(
            registry_status(&RegistryError::DuplicateRequest).code(),
            Code::AlreadyExists
        );
        assert_eq!(
            registry_status(&RegistryError::InvalidProof).code(),
            Code::Unauthenticated
        );
        assert_eq!(
            registry_status(&RegistryError::MalformedPayload("short".into())).code(),
            Code::InvalidArgument
        );
    }
}
