//! Headless page host
//!
//! In-memory stand-in for a live document: content regions keyed by
//! selector text, session history, head metadata and a script log. Inline
//! code is never run; module completion markers are set one frame after
//! insertion unless modules are stalled.

use std::cell::{Cell, Ref, RefCell};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use fnav_html::{HeadMeta, Selector};
use fnav_script::{parse_marker, ScriptError, ScriptHost, ScriptKind};

use crate::{HistoryManager, HistoryState, PageHost};

/// A script the page received
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutedScript {
    External { src: String, kind: ScriptKind },
    Inline { code: String, kind: ScriptKind },
}

/// Headless page
pub struct HeadlessPage {
    location: RefCell<String>,
    regions: RefCell<HashMap<String, String>>,
    history: RefCell<HistoryManager>,
    full_loads: RefCell<Vec<String>>,
    head: RefCell<HeadMeta>,
    present: RefCell<HashSet<String>>,
    failing: RefCell<HashSet<String>>,
    error_patterns: RefCell<Vec<(String, String)>>,
    executed: RefCell<Vec<ExecutedScript>>,
    markers: RefCell<HashSet<String>>,
    pending_markers: RefCell<Vec<String>>,
    stall_modules: Cell<bool>,
    frame: Cell<Duration>,
    load_latency: Cell<Duration>,
}

impl HeadlessPage {
    pub fn new(location: &str) -> Self {
        Self {
            location: RefCell::new(location.to_string()),
            regions: RefCell::new(HashMap::new()),
            history: RefCell::new(HistoryManager::new(location)),
            full_loads: RefCell::new(Vec::new()),
            head: RefCell::new(HeadMeta::default()),
            present: RefCell::new(HashSet::new()),
            failing: RefCell::new(HashSet::new()),
            error_patterns: RefCell::new(Vec::new()),
            executed: RefCell::new(Vec::new()),
            markers: RefCell::new(HashSet::new()),
            pending_markers: RefCell::new(Vec::new()),
            stall_modules: Cell::new(false),
            frame: Cell::new(Duration::ZERO),
            load_latency: Cell::new(Duration::ZERO),
        }
    }

    /// Add a content region addressed by `selector` text
    pub fn with_region(self, selector: &str, markup: &str) -> Self {
        self.regions.borrow_mut().insert(selector.trim().to_string(), markup.to_string());
        self
    }

    /// Treat an external script as already in the document
    pub fn with_script(self, src: &str) -> Self {
        self.present.borrow_mut().insert(src.to_string());
        self
    }

    // === Simulation controls ===

    /// Loading `src` fails
    pub fn fail_script(&self, src: &str) {
        self.failing.borrow_mut().insert(src.to_string());
    }

    /// Inline code containing `pattern` throws `message`
    pub fn throw_on(&self, pattern: &str, message: &str) {
        self.error_patterns.borrow_mut().push((pattern.to_string(), message.to_string()));
    }

    /// Modules never signal completion
    pub fn stall_modules(&self, stall: bool) {
        self.stall_modules.set(stall);
    }

    pub fn set_frame_duration(&self, frame: Duration) {
        self.frame.set(frame);
    }

    pub fn set_load_latency(&self, latency: Duration) {
        self.load_latency.set(latency);
    }

    /// Move back one entry, returning the state to hand to `handle_popstate`
    pub fn go_back(&self) -> Option<Option<HistoryState>> {
        let entry = self.history.borrow_mut().back().cloned()?;
        *self.location.borrow_mut() = entry.url.clone();
        Some(entry.spa_state())
    }

    /// Move forward one entry
    pub fn go_forward(&self) -> Option<Option<HistoryState>> {
        let entry = self.history.borrow_mut().forward().cloned()?;
        *self.location.borrow_mut() = entry.url.clone();
        Some(entry.spa_state())
    }

    // === Inspection ===

    pub fn region(&self, selector: &str) -> Option<String> {
        self.regions.borrow().get(selector.trim()).cloned()
    }

    pub fn history(&self) -> Ref<'_, HistoryManager> {
        self.history.borrow()
    }

    pub fn full_loads(&self) -> Vec<String> {
        self.full_loads.borrow().clone()
    }

    pub fn head(&self) -> HeadMeta {
        self.head.borrow().clone()
    }

    pub fn executed(&self) -> Vec<ExecutedScript> {
        self.executed.borrow().clone()
    }

    pub fn is_present(&self, src: &str) -> bool {
        self.present.borrow().contains(src)
    }
}

impl ScriptHost for HeadlessPage {
    fn has_external(&self, src: &str, _kind: ScriptKind) -> bool {
        self.present.borrow().contains(src)
    }

    async fn insert_external(&self, src: &str, kind: ScriptKind) -> Result<(), ScriptError> {
        let latency = self.load_latency.get();
        if !latency.is_zero() {
            smol::Timer::after(latency).await;
        }
        if self.failing.borrow().contains(src) {
            return Err(ScriptError::Load {
                src: src.to_string(),
                reason: "network error".to_string(),
            });
        }
        self.present.borrow_mut().insert(src.to_string());
        self.executed.borrow_mut().push(ExecutedScript::External { src: src.to_string(), kind });
        Ok(())
    }

    fn insert_inline(&self, code: &str, kind: ScriptKind) -> Result<(), ScriptError> {
        self.executed.borrow_mut().push(ExecutedScript::Inline { code: code.to_string(), kind });

        let thrown = self
            .error_patterns
            .borrow()
            .iter()
            .find(|(pattern, _)| code.contains(pattern.as_str()))
            .map(|(_, message)| message.clone());
        if let Some(message) = thrown {
            return Err(ScriptError::Execution(message));
        }

        if kind == ScriptKind::Module && !self.stall_modules.get() {
            if let Some(marker) = parse_marker(code) {
                self.pending_markers.borrow_mut().push(marker.to_string());
            }
        }
        Ok(())
    }

    fn marker_set(&self, marker: &str) -> bool {
        self.markers.borrow().contains(marker)
    }

    fn clear_marker(&self, marker: &str) {
        self.markers.borrow_mut().remove(marker);
    }

    async fn next_frame(&self) {
        let ready: Vec<String> = self.pending_markers.borrow_mut().drain(..).collect();
        self.markers.borrow_mut().extend(ready);

        let frame = self.frame.get();
        if frame.is_zero() {
            smol::future::yield_now().await;
        } else {
            smol::Timer::after(frame).await;
        }
    }
}

impl PageHost for HeadlessPage {
    fn location(&self) -> String {
        self.location.borrow().clone()
    }

    fn has_region(&self, selector: &Selector) -> bool {
        self.regions.borrow().contains_key(selector.source())
    }

    fn replace_region(&self, selector: &Selector, markup: &str) {
        if let Some(region) = self.regions.borrow_mut().get_mut(selector.source()) {
            *region = markup.to_string();
        }
    }

    fn push_history(&self, state: &HistoryState) {
        self.history.borrow_mut().push_state(Some(state.to_json()), state.path.clone());
        *self.location.borrow_mut() = state.path.clone();
    }

    fn replace_history(&self, state: &HistoryState) {
        self.history.borrow_mut().replace_state(Some(state.to_json()), state.path.clone());
    }

    fn full_load(&self, path: &str) {
        tracing::debug!("headless full load of {}", path);
        self.full_loads.borrow_mut().push(path.to_string());
        self.history.borrow_mut().push_state(None, path.to_string());
        *self.location.borrow_mut() = path.to_string();
    }

    fn set_title(&self, title: &str) {
        self.head.borrow_mut().title = Some(title.to_string());
    }

    fn set_meta_description(&self, description: &str) {
        self.head.borrow_mut().description = Some(description.to_string());
    }

    fn set_canonical(&self, href: &str) {
        self.head.borrow_mut().canonical = Some(href.to_string());
    }
}
