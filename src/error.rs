//! Error types for the logscope analyzer
//!
//! Structured error definitions use thiserror; anyhow errors raised at the
//! edges (CLI, ad-hoc collaborators) are folded into [`AnalyzerError::Other`].

use thiserror::Error;

/// Main error type for analyzer operations
#[derive(Error, Debug)]
pub enum AnalyzerError {
    /// Pattern failed to compile or validate
    #[error("Invalid pattern at offset {offset}: {reason}")]
    InvalidPattern { reason: String, offset: usize },

    /// The record source could not produce a record
    #[error("Source read failure: {0}")]
    SourceRead(String),

    /// Request parameters are inconsistent with the source
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML parse error
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("Config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Result type alias for analyzer operations
pub type Result<T> = std::result::Result<T, AnalyzerError>;

/// Convert anyhow::Error to AnalyzerError
impl From<anyhow::Error> for AnalyzerError {
    fn from(err: anyhow::Error) -> Self {
        AnalyzerError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AnalyzerError::InvalidPattern {
            reason: "unclosed group".to_string(),
            offset: 3,
        };
        assert_eq!(err.to_string(), "Invalid pattern at offset 3: unclosed group");
    }

    #[test]
    fn test_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("a = ");
        assert!(toml_err.is_err());

        let err: AnalyzerError = toml_err.unwrap_err().into();
        assert!(matches!(err, AnalyzerError::ConfigParse(_)));
    }

    #[test]
    fn test_anyhow_conversion() {
        let err: AnalyzerError = anyhow::anyhow!("boom").into();
        assert!(matches!(err, AnalyzerError::Other(ref msg) if msg == "boom"));
    }
}
