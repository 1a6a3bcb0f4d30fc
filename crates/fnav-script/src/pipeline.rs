//! Sequential script replay
//!
//! Load records map `(kind, src)` to a load state. A `Loading` record holds
//! a shared completion every concurrent caller awaits; a failed load drops
//! its record so a later navigation may try again. Records are never evicted
//! otherwise.
//!
//! `clear()` starts a new generation; a replay begun under an older one
//! inserts nothing further.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use smol::lock::OnceCell;

use crate::{
    marker_assignment, ScriptElement, ScriptError, ScriptHost, ScriptKind, ScriptSource,
    MARKER_PREFIX,
};

type LoadResult = Result<(), ScriptError>;

enum LoadState {
    Loading(Rc<OnceCell<LoadResult>>),
    Loaded,
}

/// Outcome of one external load request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadOutcome {
    Inserted,
    AlreadyLoaded,
}

/// Summary of one `replay`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Scripts inserted and completed
    pub executed: usize,
    /// Externals already loaded or present in the document
    pub skipped: usize,
    /// Errors absorbed during replay, in order
    pub failed: Vec<ScriptError>,
    /// Scripts left out because the pipeline was cleared mid-replay
    pub abandoned: usize,
}

impl ReplayReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Script execution pipeline
pub struct ScriptPipeline {
    records: RefCell<HashMap<(ScriptKind, String), LoadState>>,
    next_marker: Cell<u64>,
    generation: Cell<u64>,
    module_timeout: Option<Duration>,
}

impl ScriptPipeline {
    pub fn new() -> Self {
        Self::with_module_timeout(None)
    }

    /// Give up on module completion after `timeout`
    pub fn with_module_timeout(timeout: Option<Duration>) -> Self {
        Self {
            records: RefCell::new(HashMap::new()),
            next_marker: Cell::new(0),
            generation: Cell::new(0),
            module_timeout: timeout,
        }
    }

    pub fn module_timeout(&self) -> Option<Duration> {
        self.module_timeout
    }

    /// Whether `src` finished loading as `kind`
    pub fn is_loaded(&self, src: &str, kind: ScriptKind) -> bool {
        matches!(self.records.borrow().get(&(kind, src.to_string())), Some(LoadState::Loaded))
    }

    /// Number of load records, loading or loaded
    pub fn record_count(&self) -> usize {
        self.records.borrow().len()
    }

    /// Load an external script at most once
    pub async fn load_external<H: ScriptHost>(
        &self,
        host: &H,
        src: &str,
        kind: ScriptKind,
    ) -> Result<(), ScriptError> {
        self.load(host, src, kind).await.map(|_| ())
    }

    async fn load<H: ScriptHost>(
        &self,
        host: &H,
        src: &str,
        kind: ScriptKind,
    ) -> Result<LoadOutcome, ScriptError> {
        let key = (kind, src.to_string());

        let pending = match self.records.borrow().get(&key) {
            Some(LoadState::Loaded) => return Ok(LoadOutcome::AlreadyLoaded),
            Some(LoadState::Loading(done)) => Some(done.clone()),
            None => None,
        };
        if let Some(done) = pending {
            tracing::debug!("waiting for in-progress load of {}", src);
            return done.wait().await.clone().map(|_| LoadOutcome::AlreadyLoaded);
        }

        if host.has_external(src, kind) {
            tracing::debug!("{} already present in document", src);
            self.records.borrow_mut().insert(key, LoadState::Loaded);
            return Ok(LoadOutcome::AlreadyLoaded);
        }

        let done = Rc::new(OnceCell::new());
        self.records
            .borrow_mut()
            .insert(key.clone(), LoadState::Loading(done.clone()));

        let result = host.insert_external(src, kind).await;

        {
            let mut records = self.records.borrow_mut();
            // clear() may have run during the load
            let still_ours =
                matches!(records.get(&key), Some(LoadState::Loading(d)) if Rc::ptr_eq(d, &done));
            if still_ours {
                if result.is_ok() {
                    records.insert(key, LoadState::Loaded);
                } else {
                    records.remove(&key);
                }
            }
        }
        if done.set(result.clone()).await.is_err() {
            tracing::trace!("load completion for {} already published", src);
        }

        match result {
            Ok(()) => Ok(LoadOutcome::Inserted),
            Err(err) => {
                tracing::warn!("{}", err);
                Err(err)
            }
        }
    }

    /// Run inline code through a fresh script element.
    ///
    /// Module code resolves once its completion marker is observed, polled
    /// once per frame. Redeclaration errors count as success.
    pub async fn execute_inline<H: ScriptHost>(
        &self,
        host: &H,
        code: &str,
        kind: ScriptKind,
    ) -> Result<(), ScriptError> {
        let result = match kind {
            ScriptKind::Classic => host.insert_inline(code, kind),
            ScriptKind::Module => {
                let marker = self.issue_marker();
                let wrapped = format!("{}\n{}", code, marker_assignment(&marker));
                match host.insert_inline(&wrapped, kind) {
                    Ok(()) => {
                        let finished = self.await_marker(host, &marker).await;
                        host.clear_marker(&marker);
                        finished
                    }
                    Err(err) => Err(err),
                }
            }
        };

        match result {
            Err(err) if err.is_redeclaration() => {
                tracing::debug!("ignoring redeclaration: {}", err);
                Ok(())
            }
            Err(err) => {
                tracing::warn!("{}", err);
                Err(err)
            }
            Ok(()) => Ok(()),
        }
    }

    /// Replay scripts strictly in order, each awaited before the next.
    /// Failures are collected and never stop the replay; `clear()` does.
    pub async fn replay<H: ScriptHost>(&self, host: &H, scripts: &[ScriptElement]) -> ReplayReport {
        let mut report = ReplayReport::default();
        let generation = self.generation.get();

        for (index, script) in scripts.iter().enumerate() {
            if self.generation.get() != generation {
                report.abandoned = scripts.len() - index;
                tracing::debug!("pipeline cleared, abandoning {} scripts", report.abandoned);
                break;
            }
            let result = match &script.source {
                ScriptSource::External(src) => match self.load(host, src, script.kind).await {
                    Ok(LoadOutcome::Inserted) => Ok(true),
                    Ok(LoadOutcome::AlreadyLoaded) => Ok(false),
                    Err(err) => Err(err),
                },
                ScriptSource::Inline(code) => {
                    self.execute_inline(host, code, script.kind).await.map(|_| true)
                }
            };

            match result {
                Ok(true) => report.executed += 1,
                Ok(false) => report.skipped += 1,
                Err(err) => report.failed.push(err),
            }
        }

        tracing::debug!(
            "replayed {} scripts: {} executed, {} skipped, {} failed",
            scripts.len(),
            report.executed,
            report.skipped,
            report.failed.len()
        );
        report
    }

    /// Forget every load record and stop any replay in progress
    pub fn clear(&self) {
        self.records.borrow_mut().clear();
        self.generation.set(self.generation.get().wrapping_add(1));
    }

    fn issue_marker(&self) -> String {
        let n = self.next_marker.get();
        self.next_marker.set(n + 1);
        format!("{}{}", MARKER_PREFIX, n)
    }

    async fn await_marker<H: ScriptHost>(&self, host: &H, marker: &str) -> Result<(), ScriptError> {
        let start = Instant::now();
        loop {
            if host.marker_set(marker) {
                return Ok(());
            }
            if let Some(limit) = self.module_timeout {
                if start.elapsed() >= limit {
                    return Err(ScriptError::ModuleTimeout { after: limit });
                }
            }
            host.next_frame().await;
        }
    }
}

impl Default for ScriptPipeline {
    fn default() -> Self {
        Self::new()
    }
}
