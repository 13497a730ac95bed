//! Error types for Cogloop

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("provider unavailable: {name} - {reason}")]
    ProviderUnavailable { name: String, reason: String },

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("execution exhausted: {0}")]
    ExecutionExhausted(String),

    #[error("parse degradation: {field} - {message}")]
    ParseDegradation { field: String, message: String },

    #[error("numeric collapse: {0}")]
    NumericCollapse(String),

    #[error("no thoughts produced for trigger: {0}")]
    NoThoughts(String),

    #[error("admission denied: needed {needed:.1}, available {available:.1}")]
    AdmissionDenied { needed: f64, available: f64 },

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn provider_unavailable(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn parse_degradation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseDegradation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Errors a stage absorbs with its heuristic path instead of failing the cycle.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable { .. }
                | Self::UnknownProvider(_)
                | Self::ExecutionExhausted(_)
                | Self::ParseDegradation { .. }
                | Self::NumericCollapse(_)
        )
    }
}
