//! fnav Link Admission
//!
//! Decides whether a link target may be handled as an in-page navigation.
//!
//! Rules, first match decides:
//! - empty and fragment-only references are rejected
//! - external schemes are rejected
//! - allowlisted references are accepted
//! - forbidden paths, prefixes and segments are rejected
//! - self-navigation is rejected

mod policy;

pub use policy::{Admission, LinkPolicy, PolicyConfig, RejectReason, DEFAULT_DISALLOWED_SCHEMES};
