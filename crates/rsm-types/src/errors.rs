use thiserror::Error;

/// Main error type for the RSM workbench
#[derive(Error, Debug)]
pub enum RsmError {
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Malformed response from {tool}: {message}")]
    MalformedResponse { tool: String, message: String },

    #[error("Fitting failure: {0}")]
    Fitting(String),

    #[error("Empty result: {0}")]
    EmptyResult(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Workflow error: {0}")]
    Workflow(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RsmError {
    /// Errors raised at a remote-call boundary. These abort the current phase
    /// and are never retried.
    pub fn is_boundary_failure(&self) -> bool {
        matches!(
            self,
            RsmError::Transport(_) | RsmError::MalformedResponse { .. }
        )
    }

    /// Short machine-friendly tag for the error taxonomy.
    pub fn kind(&self) -> &'static str {
        match self {
            RsmError::Transport(_) | RsmError::Io(_) => "transport_failure",
            RsmError::MalformedResponse { .. } | RsmError::Serialization(_) => {
                "malformed_response"
            }
            RsmError::Fitting(_) => "fitting_failure",
            RsmError::EmptyResult(_) => "empty_result",
            RsmError::Validation(_) => "validation",
            RsmError::Workflow(_) => "workflow",
            RsmError::Config(_) => "config",
        }
    }
}

/// Result type alias for RSM operations
pub type RsmResult<T> = Result<T, RsmError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::RsmError::Validation(format!($($arg)*))
    };
}

/// Macro for creating fitting errors
#[macro_export]
macro_rules! fitting_error {
    ($($arg:tt)*) => {
        $crate::RsmError::Fitting(format!($($arg)*))
    };
}

/// Macro for creating transport errors
#[macro_export]
macro_rules! transport_error {
    ($($arg:tt)*) => {
        $crate::RsmError::Transport(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = RsmError::MalformedResponse {
            tool: "fit_response_surface".to_string(),
            message: "expected value at line 1".to_string(),
        };

        assert!(error.to_string().contains("Malformed response"));
        assert!(error.to_string().contains("fit_response_surface"));
    }

    #[test]
    fn test_error_conversion() {
        let json_error = serde_json::from_str::<f64>("not a number").unwrap_err();
        let rsm_error: RsmError = json_error.into();

        match rsm_error {
            RsmError::Serialization(_) => (),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_boundary_classification() {
        assert!(RsmError::Transport("pipe closed".into()).is_boundary_failure());
        assert!(!RsmError::Fitting("singular".into()).is_boundary_failure());
        assert_eq!(RsmError::EmptyResult("no points".into()).kind(), "empty_result");
    }

    #[test]
    fn test_macros() {
        let validation_err = validation_error!("Invalid value: {}", 42);
        assert!(matches!(validation_err, RsmError::Validation(_)));
        let fitting_err = fitting_error!("rank {}", 1);
        assert_eq!(fitting_err.to_string(), "Fitting failure: rank 1");
        let _transport_err = transport_error!("child exited");
    }
}
