//! SDK error classification.

use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

use crate::storage::StoreError;

/// Service error codes worth retrying.
const TRANSIENT_CODES: &[&str] = &[
    "ProvisionedThroughputExceededException",
    "ThrottlingException",
    "RequestLimitExceeded",
    "InternalServerError",
    "ServiceUnavailable",
];

/// Service error codes that mean the table, index or credentials are wrong.
const CONFIGURATION_CODES: &[&str] = &[
    "ResourceNotFoundException",
    "ValidationException",
    "AccessDeniedException",
    "UnrecognizedClientException",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorClass {
    Transient,
    Configuration,
    Rejected,
}

pub(crate) fn classify_code(code: Option<&str>) -> ErrorClass {
    match code {
        Some(code) if TRANSIENT_CODES.contains(&code) => ErrorClass::Transient,
        Some(code) if CONFIGURATION_CODES.contains(&code) => ErrorClass::Configuration,
        _ => ErrorClass::Rejected,
    }
}

/// Map an SDK failure onto [`StoreError`].
///
/// Timeouts, dispatch failures and unparseable responses are transient.
/// A request the SDK could not even build is a configuration problem.
pub(crate) fn classify<E, R>(operation: &'static str, err: SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    let class = match &err {
        SdkError::ServiceError(ctx) => classify_code(ctx.err().code()),
        SdkError::ConstructionFailure(_) => ErrorClass::Configuration,
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            ErrorClass::Transient
        }
        _ => ErrorClass::Rejected,
    };
    let message = DisplayErrorContext(&err).to_string();

    match class {
        ErrorClass::Transient => StoreError::Transient { operation, message },
        ErrorClass::Configuration => {
            StoreError::Configuration(format!("{} failed: {}", operation, message))
        }
        ErrorClass::Rejected => StoreError::Rejected { operation, message },
    }
}
