use thiserror::Error;

use crate::path::PolicyPath;
use crate::web::Rejection;

/// Errors produced by the gate.
///
/// The two variants separate wiring defects from bad client input:
/// a [`ConfigError`] means the application was set up incorrectly, a
/// [`Rejection`] means the request data failed its policy.
#[derive(Debug, Error)]
pub enum GateError {
    /// The gate or one of its policies is misconfigured.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The request data failed validation.
    #[error("{0}")]
    Validation(Rejection),
}

impl GateError {
    /// Returns `true` if this error was caused by client input.
    pub fn is_validation(&self) -> bool {
        matches!(self, GateError::Validation(_))
    }
}

impl From<Rejection> for GateError {
    fn from(rejection: Rejection) -> Self {
        GateError::Validation(rejection)
    }
}

/// A defect in how policies or routes were set up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A dotted policy path could not be parsed.
    #[error("invalid policy path '{path}': {reason}")]
    InvalidPath {
        /// The rejected path text
        path: String,
        /// Why the path was rejected
        reason: &'static str,
    },
    /// No policy is registered at the requested path.
    #[error("Policy {path} not found.")]
    PolicyNotFound {
        /// The path that was looked up
        path: PolicyPath,
    },
    /// A policy fragment did not have the expected shape.
    #[error("malformed policy fragment at '{at}': {reason}")]
    MalformedFragment {
        /// Dotted location inside the fragment (empty for the root)
        at: String,
        /// What was wrong with it
        reason: String,
    },
    /// A rule expression could not be understood by the validation engine.
    #[error(transparent)]
    Rule(#[from] RuleError),
}

/// A rule the validation engine cannot evaluate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    /// The rule name is not known to the engine.
    #[error("validation rule '{rule}' on field '{field}' is not defined")]
    UnknownRule {
        /// Field the rule was attached to
        field: String,
        /// The unknown rule name
        rule: String,
    },
    /// The rule is known but its argument is missing or malformed.
    #[error("validation rule '{rule}' on field '{field}' has an invalid argument: {reason}")]
    InvalidArgument {
        /// Field the rule was attached to
        field: String,
        /// The rule name
        rule: String,
        /// What was wrong with the argument
        reason: String,
    },
}
