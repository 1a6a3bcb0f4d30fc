//! Script elements found in fragments

use std::fmt;

/// How a script is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    /// Classic script, complete once inserted
    Classic,
    /// `type="module"`, completes asynchronously
    Module,
}

impl ScriptKind {
    /// Classify a `type` attribute. `None` means the script is a data block
    /// or template and must not be executed.
    pub fn from_type_attr(value: Option<&str>) -> Option<Self> {
        let value = match value {
            None => return Some(ScriptKind::Classic),
            Some(v) => v.trim().to_ascii_lowercase(),
        };
        let essence = value.split(';').next().unwrap_or_default().trim();
        match essence {
            "" | "text/javascript" | "application/javascript" | "text/ecmascript"
            | "application/ecmascript" | "application/x-javascript" | "text/jscript" => {
                Some(ScriptKind::Classic)
            }
            "module" => Some(ScriptKind::Module),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptKind::Classic => "classic",
            ScriptKind::Module => "module",
        }
    }
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the code comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    /// `src` reference, as written
    External(String),
    /// Element text
    Inline(String),
}

/// A script to replay, in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptElement {
    pub kind: ScriptKind,
    pub source: ScriptSource,
}

impl ScriptElement {
    pub fn external(src: impl Into<String>, kind: ScriptKind) -> Self {
        Self { kind, source: ScriptSource::External(src.into()) }
    }

    pub fn inline(code: impl Into<String>, kind: ScriptKind) -> Self {
        Self { kind, source: ScriptSource::Inline(code.into()) }
    }

    pub fn is_external(&self) -> bool {
        matches!(self.source, ScriptSource::External(_))
    }
}
