//! fnav Script Pipeline
//!
//! Replays the scripts of a swapped-in fragment in document order without
//! evaluating code: every script becomes a fresh element handed to the host.
//!
//! Features:
//! - External scripts loaded once per `(kind, src)`, concurrent loads shared
//! - Module completion observed through per-execution markers
//! - Execution errors absorbed, redeclaration errors ignored

mod host;
mod marker;
mod pipeline;

pub use fnav_html::{ScriptElement, ScriptKind, ScriptSource};
pub use host::ScriptHost;
pub use marker::{marker_assignment, parse_marker, MARKER_PREFIX};
pub use pipeline::{ReplayReport, ScriptPipeline};

use std::time::Duration;

/// Script error. Never fatal to a navigation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
    #[error("Failed to load script {src}: {reason}")]
    Load { src: String, reason: String },

    #[error("Script execution failed: {0}")]
    Execution(String),

    #[error("Module did not signal completion within {after:?}")]
    ModuleTimeout { after: Duration },
}

impl ScriptError {
    /// Re-running page code that declares top-level bindings twice
    pub fn is_redeclaration(&self) -> bool {
        match self {
            ScriptError::Execution(message) => is_redeclaration_message(message),
            _ => false,
        }
    }
}

fn is_redeclaration_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    ["already been declared", "redeclaration", "duplicate declaration"]
        .iter()
        .any(|needle| lower.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redeclaration_detected() {
        let message = "SyntaxError: Identifier 'app' has already been declared";
        let err = ScriptError::Execution(message.into());
        assert!(err.is_redeclaration());
        let redeclared = ScriptError::Execution("TypeError: Redeclaration of let x".into());
        assert!(redeclared.is_redeclaration());
        assert!(ScriptError::Execution("Duplicate Declaration \"y\"".into()).is_redeclaration());
    }

    #[test]
    fn test_other_errors_not_redeclaration() {
        let undefined = ScriptError::Execution("ReferenceError: x is not defined".into());
        assert!(!undefined.is_redeclaration());
        let load =
            ScriptError::Load { src: "/a.js".into(), reason: "already been declared".into() };
        assert!(!load.is_redeclaration());
    }
}
