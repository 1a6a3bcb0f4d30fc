//! Fragment parsing
//!
//! Parses server markup into an html5ever RcDom, then extracts the content
//! region. Replayable scripts are detached from the region before it is
//! serialized so the host never sees them as markup.

use std::rc::Rc;

use html5ever::parse_document;
use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};

use crate::script::{ScriptElement, ScriptKind};
use crate::selector::{ElementRef, Selector};

/// Parsed server markup
pub struct Fragment {
    dom: RcDom,
}

/// Content region pulled out of a fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionContent {
    /// Serialized children of the region, scripts removed
    pub markup: String,
    /// Scripts to replay, in document order
    pub scripts: Vec<ScriptElement>,
}

/// Head values synchronized into the live document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadMeta {
    pub title: Option<String>,
    pub description: Option<String>,
    pub canonical: Option<String>,
}

impl HeadMeta {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.canonical.is_none()
    }
}

impl Fragment {
    /// Parse a document or fragment. Parsing is error-tolerant and never
    /// fails; fragments get wrapped in html/head/body.
    pub fn parse(markup: &str) -> Self {
        let dom = parse_document(RcDom::default(), Default::default()).one(markup);
        tracing::trace!("parsed fragment ({} bytes)", markup.len());
        Self { dom }
    }

    /// Whether any element matches `selector`
    pub fn contains(&self, selector: &Selector) -> bool {
        find_first(&self.dom.document, selector).is_some()
    }

    /// Extract the first element matching `selector` in document order.
    ///
    /// Detaches replayable scripts from the region, so a second call returns
    /// the markup without its scripts.
    pub fn extract(&self, selector: &Selector) -> Option<RegionContent> {
        let region = find_first(&self.dom.document, selector)?;

        let mut scripts = Vec::new();
        take_scripts(&region, &mut scripts);

        Some(RegionContent {
            markup: serialize_children(&region),
            scripts,
        })
    }

    /// Title, description and canonical link, wherever they appear
    pub fn head_meta(&self) -> HeadMeta {
        let mut meta = HeadMeta::default();
        collect_head_meta(&self.dom.document, &mut meta);
        meta
    }
}

fn attrs_of(handle: &Handle) -> Option<(String, Vec<(String, String)>)> {
    match &handle.data {
        NodeData::Element { name, attrs, .. } => {
            let pairs = attrs
                .borrow()
                .iter()
                .map(|a| (a.name.local.to_string(), a.value.to_string()))
                .collect();
            Some((name.local.to_string(), pairs))
        }
        _ => None,
    }
}

fn attr_value<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    ElementRef::new("", attrs).attr(name)
}

fn find_first(handle: &Handle, selector: &Selector) -> Option<Handle> {
    if let Some((tag, attrs)) = attrs_of(handle) {
        if selector.matches(&ElementRef::new(&tag, &attrs)) {
            return Some(handle.clone());
        }
    }
    handle
        .children
        .borrow()
        .iter()
        .find_map(|child| find_first(child, selector))
}

fn text_of(handle: &Handle) -> String {
    let mut text = String::new();
    for child in handle.children.borrow().iter() {
        if let NodeData::Text { contents } = &child.data {
            text.push_str(&contents.borrow());
        }
    }
    text
}

/// What to do with a `<script>` found in the region
enum ScriptDisposition {
    Replay(ScriptElement),
    Drop,
    Keep,
}

fn classify_script(handle: &Handle, attrs: &[(String, String)]) -> ScriptDisposition {
    if attr_value(attrs, "nomodule").is_some() {
        return ScriptDisposition::Drop;
    }
    let Some(kind) = ScriptKind::from_type_attr(attr_value(attrs, "type")) else {
        return ScriptDisposition::Keep;
    };

    match attr_value(attrs, "src").map(str::trim) {
        Some(src) if !src.is_empty() => {
            ScriptDisposition::Replay(ScriptElement::external(src, kind))
        }
        _ => {
            let code = text_of(handle);
            if code.trim().is_empty() {
                ScriptDisposition::Drop
            } else {
                ScriptDisposition::Replay(ScriptElement::inline(code, kind))
            }
        }
    }
}

/// Depth-first walk that detaches executable scripts, recording them in order
fn take_scripts(handle: &Handle, out: &mut Vec<ScriptElement>) {
    let children: Vec<Handle> = handle.children.borrow().clone();
    let mut detached = Vec::new();

    for child in &children {
        match attrs_of(child) {
            Some((tag, attrs)) if tag.eq_ignore_ascii_case("script") => {
                match classify_script(child, &attrs) {
                    ScriptDisposition::Replay(script) => {
                        out.push(script);
                        detached.push(child.clone());
                    }
                    ScriptDisposition::Drop => detached.push(child.clone()),
                    ScriptDisposition::Keep => {}
                }
            }
            Some(_) => take_scripts(child, out),
            None => {}
        }
    }

    if !detached.is_empty() {
        handle
            .children
            .borrow_mut()
            .retain(|child| !detached.iter().any(|gone| Rc::ptr_eq(gone, child)));
        for gone in &detached {
            gone.parent.set(None);
        }
    }
}

fn serialize_children(handle: &Handle) -> String {
    let mut buf = Vec::new();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::ChildrenOnly(None),
        ..Default::default()
    };
    let node: SerializableHandle = handle.clone().into();
    if let Err(err) = serialize(&mut buf, &node, opts) {
        tracing::warn!("region serialization stopped early: {}", err);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_head_meta(handle: &Handle, meta: &mut HeadMeta) {
    if let Some((tag, attrs)) = attrs_of(handle) {
        match tag.as_str() {
            "title" if meta.title.is_none() => {
                let title = collapse_whitespace(&text_of(handle));
                if !title.is_empty() {
                    meta.title = Some(title);
                }
            }
            "meta" if meta.description.is_none() => {
                let is_description = attr_value(&attrs, "name")
                    .is_some_and(|n| n.eq_ignore_ascii_case("description"));
                if is_description {
                    meta.description = attr_value(&attrs, "content").map(str::to_string);
                }
            }
            "link" if meta.canonical.is_none() => {
                let is_canonical = attr_value(&attrs, "rel").is_some_and(|rel| {
                    rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("canonical"))
                });
                if is_canonical {
                    meta.canonical = attr_value(&attrs, "href").map(str::to_string);
                }
            }
            // Scripts and styles carry no head metadata
            "script" | "style" => return,
            _ => {}
        }
    }

    for child in handle.children.borrow().iter() {
        collect_head_meta(child, meta);
    }
}
