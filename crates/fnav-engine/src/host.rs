//! Page host seam

use fnav_html::Selector;
use fnav_script::ScriptHost;

use crate::HistoryState;

/// The live document and its session history.
///
/// Only the navigator calls the mutating methods, and only while rendering.
pub trait PageHost: ScriptHost {
    /// Current path (with query)
    fn location(&self) -> String;

    /// Whether the live document has an element matching `selector`
    fn has_region(&self, selector: &Selector) -> bool;

    /// Replace the children of the first element matching `selector`
    fn replace_region(&self, selector: &Selector, markup: &str);

    fn push_history(&self, state: &HistoryState);

    fn replace_history(&self, state: &HistoryState);

    /// Load `path` as a regular, non-intercepted page load
    fn full_load(&self, path: &str);

    fn set_title(&self, _title: &str) {}

    fn set_meta_description(&self, _description: &str) {}

    fn set_canonical(&self, _href: &str) {}
}
