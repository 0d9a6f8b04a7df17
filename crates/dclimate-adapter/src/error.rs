//! Error types for the adapter.
//!
//! Request-level failures never leave the adapter as transport errors: the
//! boundary renders [`AdapterError`]'s `Display` text into the `unit` field of
//! an otherwise successful response.

use thiserror::Error;

/// Convenience alias for request-level results.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Message used for both parameter count and parameter name/type mismatches.
const INCOMPATIBLE_PARAMETERS: &str = "Improperly formatted request URL, incompatible parameters";

/// Errors raised while translating and serving a single request.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Request body or URL absent
    #[error("{0}")]
    MalformedRequest(String),

    /// URL does not start with any registered version base path
    #[error("Incompatible API version, please use {supported}")]
    UnsupportedVersion { supported: String },

    /// Endpoint key not present in the schema table
    #[error("Improperly formatted request URL, endpoint not found")]
    UnknownEndpoint { key: String },

    /// Wrong number of positional or grouped parameters
    #[error("{}", INCOMPATIBLE_PARAMETERS)]
    ParameterCountMismatch { expected: usize, found: usize },

    /// Unknown query parameter or a value that fails its declared conversion
    #[error("{}", INCOMPATIBLE_PARAMETERS)]
    ParameterMismatch { name: String, reason: String },

    /// `request_ops` and `request_params` cannot be paired into steps
    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),

    /// Operation name not in the registry
    #[error("Unsupported operation: {0}")]
    UnknownOperation(String),

    /// Step parameters do not fit the operation's parameter schema
    #[error("Invalid parameters for operation {op}: {reason}")]
    InvalidStepParams { op: String, reason: String },

    /// Fetched payload is metadata or opaque binary
    #[error("Request not supported")]
    UnsupportedDatasetShape,

    /// Fetched dataset violates the sorted, unique index invariant
    #[error("Invalid dataset: {0}")]
    DatasetInvariant(String),

    /// Operation could not be applied to its input
    #[error("Operation {op} failed: {reason}")]
    OperationFailed { op: String, reason: String },

    /// Returned value cannot be encoded as a fixed-point integer or timestamp
    #[error("Incompatible return type")]
    UnsupportedOperationResult,

    /// Every step had `return_result` unset
    #[error("No return specified")]
    NoTerminalStep,

    /// Fetch capability failed; detail is passed through uninterpreted
    #[error("Request errored: {0}")]
    FetchFailure(String),
}

impl AdapterError {
    pub fn empty_request() -> Self {
        AdapterError::MalformedRequest("request data empty".to_string())
    }

    pub fn missing_url() -> Self {
        AdapterError::MalformedRequest("request_url missing".to_string())
    }

    pub fn mismatch(name: impl Into<String>, reason: impl Into<String>) -> Self {
        AdapterError::ParameterMismatch {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn step_params(op: impl Into<String>, reason: impl Into<String>) -> Self {
        AdapterError::InvalidStepParams {
            op: op.into(),
            reason: reason.into(),
        }
    }

    pub fn op_failed(op: impl Into<String>, reason: impl Into<String>) -> Self {
        AdapterError::OperationFailed {
            op: op.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_messages() {
        assert_eq!(AdapterError::empty_request().to_string(), "request data empty");
        assert_eq!(AdapterError::missing_url().to_string(), "request_url missing");
        assert_eq!(
            AdapterError::UnknownEndpoint {
                key: "not-a-real-endpoint".into()
            }
            .to_string(),
            "Improperly formatted request URL, endpoint not found"
        );
        assert_eq!(AdapterError::NoTerminalStep.to_string(), "No return specified");
        assert_eq!(
            AdapterError::UnsupportedDatasetShape.to_string(),
            "Request not supported"
        );
    }

    #[test]
    fn test_parameter_errors_share_message() {
        let count = AdapterError::ParameterCountMismatch {
            expected: 3,
            found: 2,
        };
        let name = AdapterError::mismatch("bogus", "not a declared query parameter");
        assert_eq!(count.to_string(), name.to_string());
        assert!(count.to_string().contains("incompatible parameters"));
    }

    #[test]
    fn test_fetch_failure_carries_detail() {
        let err = AdapterError::FetchFailure("gateway returned 502".into());
        assert_eq!(err.to_string(), "Request errored: gateway returned 502");
    }
}
