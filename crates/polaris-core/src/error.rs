/// Core error types for the Polaris presentation bridge.

/// A specialized Result type for Polaris operations.
pub type PolarisResult<T> = Result<T, PolarisError>;

/// Top-level error type encompassing all Polaris subsystems.
#[derive(Debug, thiserror::Error)]
pub enum PolarisError {
    #[error("unknown image id {0}")]
    UnknownImage(i32),

    #[error("image {id} is {expected:?} but update supplied {actual:?}")]
    SizeMismatch {
        id: i32,
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("image {id} expects {expected} pixels, got {actual}")]
    PixelCount {
        id: i32,
        expected: usize,
        actual: usize,
    },

    #[error("rule image {0} is not cached")]
    MissingRuleImage(i32),

    #[error("render error: {0}")]
    Render(String),

    #[error("gpu error: {0}")]
    Gpu(String),

    #[error("audio error: {0}")]
    Audio(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("contract violation: {0}")]
    Contract(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PolarisError {
    /// True for errors caused by the caller breaking the emission-order
    /// contract (unknown ids, mismatched sizes, missing rule images).
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            PolarisError::UnknownImage(_)
                | PolarisError::SizeMismatch { .. }
                | PolarisError::PixelCount { .. }
                | PolarisError::MissingRuleImage(_)
                | PolarisError::Contract(_)
        )
    }
}

/// Report a broken caller contract.
///
/// Debug builds treat this as fatal. Release builds log it and carry on,
/// turning the offending operation into a no-op.
#[track_caller]
pub fn contract_violation(err: &PolarisError) {
    tracing::error!(error = %err, "contract violation");
    if cfg!(debug_assertions) {
        panic!("contract violation: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_mismatch_display() {
        let err = PolarisError::SizeMismatch {
            id: 3,
            expected: (2, 1),
            actual: (4, 4),
        };
        assert_eq!(
            err.to_string(),
            "image 3 is (2, 1) but update supplied (4, 4)"
        );
    }

    #[test]
    fn test_contract_classification() {
        assert!(PolarisError::UnknownImage(1).is_contract_violation());
        assert!(PolarisError::MissingRuleImage(9).is_contract_violation());
        assert!(!PolarisError::Storage("gone".into()).is_contract_violation());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "contract violation")]
    fn test_contract_violation_is_fatal_in_debug() {
        contract_violation(&PolarisError::UnknownImage(7));
    }
}
