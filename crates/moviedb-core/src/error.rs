//! Error types for all moviedb operations.

use std::io;
use thiserror::Error;

use crate::types::ScalarType;

/// Top-level error type for façade operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Fixture(#[from] FixtureError),

    /// A bulk load stopped partway through. Records before the failing one
    /// stay written.
    #[error("bulk load stopped after {loaded} record(s): {source}")]
    PartialLoad {
        loaded: usize,
        #[source]
        source: ServiceError,
    },
}

impl Error {
    /// The remote error code, if this error came from the service.
    pub fn service_code(&self) -> Option<&str> {
        match self {
            Error::Service(e) | Error::PartialLoad { source: e, .. } => Some(&e.code),
            _ => None,
        }
    }
}

/// An error reported by the remote item service (or by the transport to it).
///
/// `code` carries the service's error code verbatim so callers can branch
/// on it; `message` is the human-readable explanation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct ServiceError {
    pub code: String,
    pub message: String,
}

impl ServiceError {
    pub const CONDITIONAL_CHECK_FAILED: &'static str = "ConditionalCheckFailedException";
    pub const RESOURCE_NOT_FOUND: &'static str = "ResourceNotFoundException";
    pub const RESOURCE_IN_USE: &'static str = "ResourceInUseException";
    pub const VALIDATION: &'static str = "ValidationException";
    pub const MALFORMED_ITEM: &'static str = "MalformedItem";
    /// The request never got a service response (network, credentials, timeout).
    pub const TRANSPORT: &'static str = "TransportError";

    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn condition_failed() -> Self {
        Self::new(
            Self::CONDITIONAL_CHECK_FAILED,
            "The conditional request failed",
        )
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(Self::VALIDATION, message)
    }

    pub fn table_not_found(table: &str) -> Self {
        Self::new(
            Self::RESOURCE_NOT_FOUND,
            format!("Requested resource not found: Table: {table} not found"),
        )
    }

    pub fn table_in_use(table: &str) -> Self {
        Self::new(
            Self::RESOURCE_IN_USE,
            format!("Table already exists: {table}"),
        )
    }

    /// An item came back from the service in a shape this crate cannot decode.
    pub fn malformed_item(message: impl Into<String>) -> Self {
        Self::new(Self::MALFORMED_ITEM, message)
    }

    pub fn is_condition_failed(&self) -> bool {
        self.code == Self::CONDITIONAL_CHECK_FAILED
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("table name must not be empty")]
    EmptyTableName,

    #[error("key schema must contain exactly one HASH key")]
    MissingPartitionKey,

    #[error("key schema may contain at most one RANGE key")]
    MultipleSortKeys,

    #[error("attribute '{0}' is used twice in the key schema")]
    DuplicateKeyAttribute(String),

    #[error("key attribute '{0}' has no attribute definition")]
    UndefinedKeyAttribute(String),

    #[error("attribute '{name}' is declared as {declared} but redefined as {requested}")]
    AttributeTypeConflict {
        name: String,
        declared: ScalarType,
        requested: ScalarType,
    },

    #[error("attribute definition '{0}' is not used by the key schema")]
    UnusedAttributeDefinition(String),

    #[error("provisioned capacity must be positive (read={read}, write={write})")]
    InvalidCapacity { read: i64, write: i64 },
}

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("cannot read fixture: {0}")]
    Io(#[from] io::Error),

    #[error("fixture is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("fixture must be a JSON array of movie records")]
    NotAnArray,

    #[error("record {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },
}

/// Errors raised while parsing or evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    #[error("invalid attribute path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("the document path provided in the update expression is invalid for update: {0}")]
    InvalidDocumentPath(String),

    #[error("expression depth exceeds maximum of {0}")]
    TooDeep(usize),

    #[error("AND/OR requires at least one operand")]
    EmptyGroup,

    #[error("two document paths overlap with each other: [{0}], [{1}]")]
    OverlappingPaths(String, String),

    #[error("cannot update attribute {0}; this attribute is part of the key")]
    KeyAttributeUpdate(String),

    #[error("update expression must contain at least one action")]
    EmptyUpdate,
}

impl From<ExpressionError> for ServiceError {
    fn from(e: ExpressionError) -> Self {
        ServiceError::validation(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
