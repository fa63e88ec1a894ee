// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use thiserror::Error;

/// Workspace-wide error type.
///
/// Hard failures carry enough detail for a caller to show a specific
/// message; advisory signals (degradation, drift, data-quality reductions)
/// are never errors and travel through the event surface instead.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("model not found: {name}")]
    ModelNotFound { name: String },

    #[error("model {name} has no version {version}")]
    VersionNotFound { name: String, version: String },

    #[error("shape mismatch in {context}: left has {left} elements, right has {right}")]
    ShapeMismatch {
        context: String,
        left: usize,
        right: usize,
    },

    #[error("insufficient history: need at least {required} points, got {actual}")]
    InsufficientHistory { required: usize, actual: usize },

    #[error("model load failed: {0}")]
    LoadFailure(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("unknown scoring profile: {0}")]
    UnknownProfile(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl EngineError {
    pub fn model_not_found(name: impl Into<String>) -> Self {
        Self::ModelNotFound { name: name.into() }
    }

    pub fn version_not_found(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self::VersionNotFound {
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn shape_mismatch(context: impl Into<String>, left: usize, right: usize) -> Self {
        Self::ShapeMismatch {
            context: context.into(),
            left,
            right,
        }
    }

    pub fn insufficient_history(required: usize, actual: usize) -> Self {
        Self::InsufficientHistory { required, actual }
    }

    pub fn load_failure(message: impl Into<String>) -> Self {
        Self::LoadFailure(message.into())
    }

    pub fn inference(message: impl Into<String>) -> Self {
        Self::Inference(message.into())
    }

    pub fn unknown_profile(name: impl Into<String>) -> Self {
        Self::UnknownProfile(name.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::EngineError;

    #[test]
    fn messages_name_the_failing_entity() {
        let err = EngineError::model_not_found("quality-v2");
        assert_eq!(err.to_string(), "model not found: quality-v2");

        let err = EngineError::version_not_found("quality-v2", "1.3.0");
        assert_eq!(err.to_string(), "model quality-v2 has no version 1.3.0");
    }

    #[test]
    fn shape_mismatch_reports_both_lengths() {
        let err = EngineError::shape_mismatch("classification metrics", 10, 8);
        let msg = err.to_string();
        assert!(msg.contains("left has 10"), "unexpected message: {msg}");
        assert!(msg.contains("right has 8"), "unexpected message: {msg}");
    }

    #[test]
    fn insufficient_history_reports_required_and_actual() {
        let err = EngineError::insufficient_history(7, 3);
        assert_eq!(
            err.to_string(),
            "insufficient history: need at least 7 points, got 3"
        );
    }
}
