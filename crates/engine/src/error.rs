//! Error types for activity IO activation.
//!
//! Declaration errors surface from [`crate::ActivityExtensions::load`] before any activation
//! exists. Resolution errors surface from the activation call that triggered them and are never
//! retried here. Soft misses (unknown field ids, undefined values) are not errors at all.

use std::error::Error as StdError;

use thiserror::Error;

use crate::config::ConfigError;

/// Boxed source error carried by resolution failures.
pub type BoxedSource = Box<dyn StdError + Send + Sync + 'static>;

/// Result alias used throughout the engine.
pub type ActivationResult<T> = Result<T, ActivationError>;

#[derive(Debug, Error)]
pub enum ActivationError {
    #[error("<{activity_id}> parameter {parameter}: {format} is unsupported")]
    UnsupportedScriptFormat {
        activity_id: String,
        parameter: String,
        format: String,
    },

    #[error("<{activity_id}> malformed declaration: {reason}")]
    MalformedDeclaration { activity_id: String, reason: String },

    #[error("expression {expression} failed: {source}")]
    Expression {
        expression: String,
        #[source]
        source: BoxedSource,
    },

    #[error("script for {parameter} failed: {source}")]
    Script {
        parameter: String,
        #[source]
        source: BoxedSource,
    },

    #[error("<{activity_id}> service call failed: {source}")]
    Service {
        activity_id: String,
        #[source]
        source: BoxedSource,
    },

    #[error("data object {data_object_id} was already written")]
    WriteConflict { data_object_id: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ActivationError {
    pub(crate) fn malformed(activity_id: &str, reason: impl Into<String>) -> Self {
        Self::MalformedDeclaration {
            activity_id: activity_id.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn expression(expression: &str, source: anyhow::Error) -> Self {
        Self::Expression {
            expression: expression.to_string(),
            source: source.into(),
        }
    }

    pub(crate) fn script(parameter: &str, source: anyhow::Error) -> Self {
        Self::Script {
            parameter: parameter.to_string(),
            source: source.into(),
        }
    }

    pub(crate) fn service(activity_id: &str, source: anyhow::Error) -> Self {
        Self::Service {
            activity_id: activity_id.to_string(),
            source: source.into(),
        }
    }

    /// True for errors raised while compiling a declaration.
    pub fn is_declaration_error(&self) -> bool {
        matches!(self, Self::UnsupportedScriptFormat { .. } | Self::MalformedDeclaration { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_message_names_the_format() {
        let error = ActivationError::UnsupportedScriptFormat {
            activity_id: "task".into(),
            parameter: "input".into(),
            format: "python".into(),
        };
        assert!(error.to_string().contains("python is unsupported"));
        assert!(error.is_declaration_error());
    }

    #[test]
    fn resolution_errors_keep_their_source() {
        let error = ActivationError::service("task", anyhow::anyhow!("connection refused"));
        assert!(!error.is_declaration_error());
        let source = StdError::source(&error).expect("source");
        assert_eq!(source.to_string(), "connection refused");
    }
}
