//! Error types for builder declaration, construction and dispatch.

use thiserror::Error;

/// Error classes, one per contract a caller can violate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: Subject is not a registered, constructible type
    InvalidSubject,
    /// E002: Operation name already defined
    DuplicateOperation,
    /// E003: Operation defined without a behavior
    MissingBehavior,
    /// E004: Mapping collection written without a usable key
    InvalidCollectionKey,
    /// E005: Operation lookup, signature or attribute failure at call time
    Dispatch,
}

impl ErrorCode {
    /// Returns the error code string (e.g., "E001").
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::InvalidSubject => "E001",
            ErrorCode::DuplicateOperation => "E002",
            ErrorCode::MissingBehavior => "E003",
            ErrorCode::InvalidCollectionKey => "E004",
            ErrorCode::Dispatch => "E005",
        }
    }
}

/// Error raised by the builder registry.
///
/// Every variant is a programmer-contract violation surfaced immediately;
/// nothing is retried and no partial state is rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    // === E001: Invalid subject ===
    #[error("[E001] {subject} has no registered builder")]
    InvalidSubject { subject: String },

    // === E002: Duplicate operation ===
    #[error("[E002] operation `{name}` is already defined for {subject}")]
    DuplicateOperation { subject: &'static str, name: String },

    // === E003: Missing behavior ===
    #[error("[E003] operation `{name}` for {subject} was defined without a behavior")]
    MissingBehavior { subject: &'static str, name: String },

    // === E004: Invalid collection key ===
    #[error("[E004] collection `{collection}` on {subject} is keyed and needs a non-empty key")]
    InvalidCollectionKey {
        subject: &'static str,
        collection: String,
    },

    // === E005: Dispatch ===
    #[error("[E005] {subject} has no visible operation `{name}`")]
    UnknownOperation { subject: &'static str, name: String },

    #[error("[E005] operation `{name}` has signature {expected}, called as {found}")]
    SignatureMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("[E005] attribute `{key}` does not hold a {expected}")]
    AttributeType { key: String, expected: &'static str },

    #[error("[E005] builder for {subject} is not exposed as `{name}`")]
    UnexposedName { subject: &'static str, name: String },

    #[error("[E005] {subject} instance was not constructed through a builder")]
    Unbound { subject: &'static str },

    #[error("[E005] builder for {subject} outlived its registry")]
    Detached { subject: &'static str },
}

impl BuildError {
    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            BuildError::InvalidSubject { .. } => ErrorCode::InvalidSubject,
            BuildError::DuplicateOperation { .. } => ErrorCode::DuplicateOperation,
            BuildError::MissingBehavior { .. } => ErrorCode::MissingBehavior,
            BuildError::InvalidCollectionKey { .. } => ErrorCode::InvalidCollectionKey,
            _ => ErrorCode::Dispatch,
        }
    }
}
