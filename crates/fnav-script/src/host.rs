//! Host seam for script insertion

use std::future::Future;

use crate::{ScriptError, ScriptKind};

/// The live document, as far as script replay needs it.
///
/// Implementations insert real script elements; nothing here evaluates code.
pub trait ScriptHost {
    /// Whether a script element with this `src` already exists
    fn has_external(&self, src: &str, kind: ScriptKind) -> bool;

    /// Insert an external script and resolve once it loaded or failed
    fn insert_external(
        &self,
        src: &str,
        kind: ScriptKind,
    ) -> impl Future<Output = Result<(), ScriptError>>;

    /// Insert an inline script. Classic scripts have run when this returns.
    fn insert_inline(&self, code: &str, kind: ScriptKind) -> Result<(), ScriptError>;

    /// Whether the completion marker has been set by page code
    fn marker_set(&self, marker: &str) -> bool;

    /// Remove a completion marker
    fn clear_marker(&self, marker: &str);

    /// Resolve at the next rendering frame
    fn next_frame(&self) -> impl Future<Output = ()>;
}
