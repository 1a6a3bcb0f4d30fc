//! Simple selectors
//!
//! Supports compound selectors made of a tag (or `*`), `#id`, `.class`,
//! `[attr]` and `[attr=value]`, joined into lists with commas. Combinators
//! and pseudo-classes are rejected.

use std::fmt;

/// Selector parse error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("Empty selector")]
    Empty,

    #[error("Unexpected character '{found}' at {position} in selector \"{selector}\"")]
    Unexpected { selector: String, found: char, position: usize },

    #[error("Unterminated attribute selector in \"{0}\"")]
    Unterminated(String),
}

/// Borrowed view of an element for matching
#[derive(Debug, Clone, Copy)]
pub struct ElementRef<'a> {
    pub tag: &'a str,
    pub attrs: &'a [(String, String)],
}

impl<'a> ElementRef<'a> {
    pub fn new(tag: &'a str, attrs: &'a [(String, String)]) -> Self {
        Self { tag, attrs }
    }

    /// Get attribute value (names compare case-insensitively)
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrMatch {
    name: String,
    value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrMatch>,
}

impl Compound {
    fn matches(&self, element: &ElementRef<'_>) -> bool {
        if let Some(tag) = &self.tag {
            if !tag.eq_ignore_ascii_case(element.tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.attr("id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let class_attr = element.attr("class").unwrap_or_default();
            if !self.classes.iter().all(|c| class_attr.split_whitespace().any(|have| have == c)) {
                return false;
            }
        }
        self.attrs.iter().all(|want| match (element.attr(&want.name), &want.value) {
            (Some(_), None) => true,
            (Some(have), Some(value)) => have == value,
            (None, _) => false,
        })
    }
}

/// Parsed selector list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    alternatives: Vec<Compound>,
}

impl Selector {
    /// Parse a selector list
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(SelectorError::Empty);
        }

        let mut alternatives = Vec::new();
        let mut offset = source.len() - source.trim_start().len();
        for part in trimmed.split(',') {
            let lead = part.len() - part.trim_start().len();
            alternatives.push(parse_compound(source, part.trim(), offset + lead)?);
            offset += part.len() + 1;
        }

        Ok(Self {
            source: trimmed.to_string(),
            alternatives,
        })
    }

    /// Selector text as written
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Check whether an element matches any alternative
    pub fn matches(&self, element: &ElementRef<'_>) -> bool {
        self.alternatives.iter().any(|c| c.matches(element))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn parse_compound(source: &str, text: &str, base: usize) -> Result<Compound, SelectorError> {
    if text.is_empty() {
        return Err(SelectorError::Empty);
    }

    let unexpected = |found: char, at: usize| SelectorError::Unexpected {
        selector: source.to_string(),
        found,
        position: base + at,
    };

    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut compound = Compound::default();
    let mut i = 0;

    let read_ident = |start: usize| -> (String, usize) {
        let mut end = start;
        while end < chars.len() && is_ident_char(chars[end].1) {
            end += 1;
        }
        (chars[start..end].iter().map(|(_, c)| c).collect(), end)
    };

    // Optional type selector
    if let Some(&(_, c)) = chars.first() {
        if c == '*' {
            i = 1;
        } else if is_ident_char(c) {
            let (tag, end) = read_ident(0);
            compound.tag = Some(tag.to_ascii_lowercase());
            i = end;
        }
    }

    while i < chars.len() {
        let (at, c) = chars[i];
        match c {
            '#' | '.' => {
                let (name, end) = read_ident(i + 1);
                if name.is_empty() {
                    let found = chars.get(i + 1).map(|(_, c)| *c).unwrap_or(c);
                    return Err(unexpected(found, at));
                }
                if c == '#' {
                    compound.id = Some(name);
                } else {
                    compound.classes.push(name);
                }
                i = end;
            }
            '[' => {
                let close = chars[i..]
                    .iter()
                    .position(|(_, c)| *c == ']')
                    .map(|p| p + i)
                    .ok_or_else(|| SelectorError::Unterminated(source.to_string()))?;
                let inner: String = chars[i + 1..close].iter().map(|(_, c)| c).collect();
                compound.attrs.push(parse_attr(&inner).ok_or_else(|| unexpected('[', at))?);
                i = close + 1;
            }
            other => return Err(unexpected(other, at)),
        }
    }

    Ok(compound)
}

fn parse_attr(inner: &str) -> Option<AttrMatch> {
    let (name, value) = match inner.split_once('=') {
        Some((name, value)) => {
            let value = value.trim();
            let unquoted = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            (name.trim(), Some(unquoted.to_string()))
        }
        None => (inner.trim(), None),
    };

    if name.is_empty() || !name.chars().all(is_ident_char) {
        return None;
    }
    Some(AttrMatch {
        name: name.to_ascii_lowercase(),
        value,
    })
}
