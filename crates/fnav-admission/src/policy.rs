//! Admission policy
//!
//! Forbidden-set matching works on the path portion of a reference (query
//! and fragment stripped, lower-cased). Segments match anywhere in the path
//! and only as whole segments, so forbidding `api` leaves `/apiary` and
//! `/v1/apikeys` navigable.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Schemes that always leave the application
pub const DEFAULT_DISALLOWED_SCHEMES: &[&str] = &[
    "http", "https", "ftp", "javascript", "mailto", "tel", "file", "data", "blob", "ws", "wss",
];

/// Why a reference was declined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Missing or blank reference
    Empty,
    /// `#section` style reference
    FragmentOnly,
    /// Protocol-relative or disallowed scheme
    ExternalScheme,
    /// Matched a forbidden path, prefix or segment
    Forbidden,
    /// Same as the current path
    SelfNavigation,
}

/// Admission decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accept,
    /// Accepted through the allowlist, forbidden sets were not consulted
    Allowlisted,
    Reject(RejectReason),
}

impl Admission {
    pub fn is_accept(&self) -> bool {
        !matches!(self, Admission::Reject(_))
    }
}

/// Serializable policy settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub forbidden_segments: Vec<String>,
    pub forbidden_prefixes: Vec<String>,
    pub forbidden_paths: Vec<String>,
    pub allowlist: Vec<String>,
    pub disallowed_schemes: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            forbidden_segments: ["api", "admin", "download", "export"].map(String::from).to_vec(),
            forbidden_prefixes: ["/static/", "/media/"].map(String::from).to_vec(),
            forbidden_paths: ["/logout", "/login"].map(String::from).to_vec(),
            allowlist: Vec::new(),
            disallowed_schemes: DEFAULT_DISALLOWED_SCHEMES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Link admission policy
///
/// Sets only grow at runtime.
#[derive(Debug, Clone)]
pub struct LinkPolicy {
    schemes: HashSet<String>,
    allowlist: HashSet<String>,
    forbidden_paths: HashSet<String>,
    forbidden_prefixes: Vec<String>,
    forbidden_segments: HashSet<String>,
}

impl LinkPolicy {
    /// Build a policy from settings
    pub fn new(config: &PolicyConfig) -> Self {
        let mut policy = Self {
            schemes: config.disallowed_schemes.iter().map(|s| s.to_ascii_lowercase()).collect(),
            allowlist: HashSet::new(),
            forbidden_paths: HashSet::new(),
            forbidden_prefixes: Vec::new(),
            forbidden_segments: HashSet::new(),
        };
        for reference in &config.allowlist {
            policy.allow(reference);
        }
        for segment in &config.forbidden_segments {
            policy.forbid_segment(segment);
        }
        for prefix in &config.forbidden_prefixes {
            policy.forbid_prefix(prefix);
        }
        for path in &config.forbidden_paths {
            policy.forbid_path(path);
        }
        policy
    }

    /// Check whether `reference` may be navigated in-page from `current_path`
    pub fn is_navigable(&self, reference: &str, current_path: &str) -> bool {
        self.evaluate(reference, current_path).is_accept()
    }

    /// Evaluate the rules in order and report the deciding one
    pub fn evaluate(&self, reference: &str, current_path: &str) -> Admission {
        if reference.trim().is_empty() {
            return Admission::Reject(RejectReason::Empty);
        }
        if reference.starts_with('#') {
            return Admission::Reject(RejectReason::FragmentOnly);
        }
        if self.is_external(reference) {
            return Admission::Reject(RejectReason::ExternalScheme);
        }

        let path = path_of(reference);
        if self.allowlist.contains(reference) || self.allowlist.contains(path) {
            return Admission::Allowlisted;
        }
        if self.is_forbidden(&path.to_lowercase()) {
            return Admission::Reject(RejectReason::Forbidden);
        }
        if reference == current_path {
            return Admission::Reject(RejectReason::SelfNavigation);
        }
        Admission::Accept
    }

    // === Runtime additions ===

    /// Always accept this reference (still subject to scheme checks)
    pub fn allow(&mut self, reference: &str) {
        tracing::debug!("allowlisted {}", reference);
        self.allowlist.insert(reference.to_string());
    }

    /// Reject paths containing this segment anywhere
    pub fn forbid_segment(&mut self, segment: &str) {
        let segment = segment.trim_matches('/').to_lowercase();
        if !segment.is_empty() {
            self.forbidden_segments.insert(segment);
        }
    }

    /// Reject paths starting with this prefix
    pub fn forbid_prefix(&mut self, prefix: &str) {
        let prefix = prefix.to_lowercase();
        if !prefix.is_empty() && !self.forbidden_prefixes.contains(&prefix) {
            self.forbidden_prefixes.push(prefix);
        }
    }

    /// Reject this exact path
    pub fn forbid_path(&mut self, path: &str) {
        self.forbidden_paths.insert(path.to_lowercase());
    }

    fn is_external(&self, reference: &str) -> bool {
        if reference.starts_with("//") {
            return true;
        }
        scheme_of(reference)
            .map(|scheme| self.schemes.contains(&scheme.to_ascii_lowercase()))
            .unwrap_or(false)
    }

    fn is_forbidden(&self, path: &str) -> bool {
        if self.forbidden_paths.contains(path) {
            return true;
        }
        if self.forbidden_prefixes.iter().any(|p| path.starts_with(p.as_str())) {
            return true;
        }
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .any(|segment| self.forbidden_segments.contains(segment))
    }
}

impl Default for LinkPolicy {
    fn default() -> Self {
        Self::new(&PolicyConfig::default())
    }
}

/// Path portion of a reference, query and fragment removed
fn path_of(reference: &str) -> &str {
    match reference.find(['?', '#']) {
        Some(i) => &reference[..i],
        None => reference,
    }
}

/// URI scheme of a reference, if it has one
fn scheme_of(reference: &str) -> Option<&str> {
    let colon = reference.find(':')?;
    let candidate = &reference[..colon];
    let mut chars = candidate.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    chars
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        .then_some(candidate)
}
