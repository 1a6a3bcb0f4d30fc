//! fnav HTML
//!
//! Parses server fragments with html5ever, locates the content region and
//! separates replayable scripts from the markup that gets swapped in.

mod parser;
mod script;
mod selector;

pub use parser::{Fragment, HeadMeta, RegionContent};
pub use script::{ScriptElement, ScriptKind, ScriptSource};
pub use selector::{ElementRef, Selector, SelectorError};
