//! Error Types
//!
//! Every fallible stage of the pipeline reports through [`ZkError`]. A proof
//! that fails verification is not an error: verifiers return `false`.

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, ZkError>;

#[derive(Debug, Error)]
pub enum ZkError {
    /// Bad permutation parameters, or a constraint referring to a variable
    /// that was never allocated
    #[error("malformed circuit definition: {0}")]
    MalformedCircuitDefinition(String),

    /// A constraint does not hold for the supplied or computed values
    #[error("constraint {index} violated: {label}")]
    ConstraintViolation { index: usize, label: String },

    /// Witness input missing a signal or carrying a non-canonical value
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A setup step was run before the artifact it depends on exists
    #[error("setup artifact missing: {0}")]
    SetupArtifactMissing(String),

    /// A setup artifact exists but does not fit the step consuming it
    #[error("setup artifact mismatched: {0}")]
    SetupArtifactMismatched(String),

    /// A proof or key could not be decoded
    #[error("malformed proof or key: {0}")]
    MalformedProofOrKey(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_message_names_constraint() {
        let err = ZkError::ConstraintViolation {
            index: 240,
            label: "hash output".to_string(),
        };
        assert_eq!(err.to_string(), "constraint 240 violated: hash output");
    }

    #[test]
    fn test_json_error_converts() {
        let parsed: std::result::Result<u64, _> = serde_json::from_str("not json");
        let err: ZkError = parsed.unwrap_err().into();
        assert!(matches!(err, ZkError::Serialization(_)));
    }
}
