//! Navigation controller
//!
//! ```text
//! Idle -> Validating -> Resolving(CacheHit | Fetching) -> Rendering -> Idle
//!                            \______________________________\-> Fallback -> Idle
//! ```
//!
//! One navigation runs at a time. `transitioning` is held by a guard for the
//! whole attempt and a second `navigate` observing it is rejected. Prefetch
//! runs outside the state machine and only touches the cache; a navigation
//! to a path being prefetched waits for that prefetch instead of fetching
//! it again.
//!
//! Yield points: fetch and retry backoff, an in-flight prefetch, the
//! pre-render delay, one frame before script replay, module completion
//! polling, and the hover debounce.
//! No `RefCell` borrow is held across any of them.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use fnav_admission::{Admission, LinkPolicy};
use fnav_cache::{CacheStats, ContentCache};
use fnav_html::{ElementRef, Fragment, Selector};
use fnav_net::{FetchClient, FetchError, Transport};
use fnav_script::ScriptPipeline;
use smol::channel::{Receiver, Sender};

use crate::{
    ConfigError, Event, EventBus, HistoryState, LinkActivation, Metrics, MouseButton,
    NavigationError, NavigationEvent, NavigatorConfig, PageHost, RenderContext, RenderHook,
    SubscriptionId,
};

/// How the resolving step obtained the markup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    CacheHit,
    Fetching,
}

/// Observable state machine phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavPhase {
    #[default]
    Idle,
    Validating,
    Resolving(Resolution),
    Rendering,
    Fallback,
}

/// Navigation state snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationState {
    pub current_path: String,
    pub transitioning: bool,
    pub phase: NavPhase,
}

/// Result of a history traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopOutcome {
    /// Entry rendered in-page
    Navigated,
    /// In-page attempt failed and fell back to a full load
    FellBack,
    /// Entry is not ours; the host handles it
    External,
    /// Navigator busy, destroyed or already showing the entry
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HistoryMode {
    Push,
    /// The host already moved through history
    Traverse,
}

/// Holds `transitioning` for one attempt
struct TransitionGuard<'a> {
    transitioning: &'a Cell<bool>,
    phase: &'a Cell<NavPhase>,
}

impl<'a> TransitionGuard<'a> {
    fn enter(transitioning: &'a Cell<bool>, phase: &'a Cell<NavPhase>) -> Self {
        transitioning.set(true);
        phase.set(NavPhase::Validating);
        Self { transitioning, phase }
    }
}

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        self.phase.set(NavPhase::Idle);
        self.transitioning.set(false);
    }
}

/// Claims one prefetch path. Waiters on the path wake when it drops.
struct PrefetchSlot<'a> {
    inflight: &'a RefCell<HashMap<String, Receiver<()>>>,
    path: String,
    _done: Sender<()>,
}

impl<'a> PrefetchSlot<'a> {
    fn claim(inflight: &'a RefCell<HashMap<String, Receiver<()>>>, path: &str) -> Option<Self> {
        let mut paths = inflight.borrow_mut();
        if paths.contains_key(path) {
            return None;
        }
        let (done, waiter) = smol::channel::bounded(1);
        paths.insert(path.to_string(), waiter);
        Some(Self { inflight, path: path.to_string(), _done: done })
    }
}

impl Drop for PrefetchSlot<'_> {
    fn drop(&mut self) {
        self.inflight.borrow_mut().remove(&self.path);
    }
}

macro_rules! step {
    ($nav:expr, $($arg:tt)*) => {
        if $nav.debug.get() {
            tracing::debug!($($arg)*);
        }
    };
}

/// In-page navigator
pub struct Navigator<H: PageHost, T: Transport> {
    config: NavigatorConfig,
    host: H,
    content: Selector,
    links: Selector,
    policy: RefCell<LinkPolicy>,
    cache: RefCell<ContentCache>,
    fetcher: FetchClient<T>,
    scripts: ScriptPipeline,
    events: EventBus,
    metrics: RefCell<Metrics>,
    hooks: RefCell<Vec<Rc<dyn RenderHook<H>>>>,
    current_path: RefCell<String>,
    transitioning: Cell<bool>,
    phase: Cell<NavPhase>,
    prefetching: RefCell<HashMap<String, Receiver<()>>>,
    hover_generation: Cell<u64>,
    debug: Cell<bool>,
    destroyed: Cell<bool>,
}

impl<H: PageHost, T: Transport> Navigator<H, T> {
    /// Build a navigator for the page `host` is showing.
    ///
    /// Replaces the current history entry with a navigator-owned state so
    /// that returning to it is handled in-page.
    pub fn new(config: NavigatorConfig, host: H, transport: T) -> Result<Self, ConfigError> {
        config.validate()?;
        let content = config.content_region()?;
        let links = config.navigable_items()?;
        let cache = ContentCache::new(config.capacity()?, config.cache_ttl());
        let fetcher = FetchClient::new(transport, config.fetch_config());
        let scripts = ScriptPipeline::with_module_timeout(config.module_timeout());

        let location = host.location();
        host.replace_history(&HistoryState::new(location.clone()));
        tracing::info!("navigator attached at {}", location);

        Ok(Self {
            policy: RefCell::new(LinkPolicy::new(&config.links)),
            debug: Cell::new(config.debug),
            config,
            host,
            content,
            links,
            cache: RefCell::new(cache),
            fetcher,
            scripts,
            events: EventBus::new(),
            metrics: RefCell::new(Metrics::default()),
            hooks: RefCell::new(Vec::new()),
            current_path: RefCell::new(location),
            transitioning: Cell::new(false),
            phase: Cell::new(NavPhase::Idle),
            prefetching: RefCell::new(HashMap::new()),
            hover_generation: Cell::new(0),
            destroyed: Cell::new(false),
        })
    }

    // === Accessors ===

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn transport(&self) -> &T {
        self.fetcher.transport()
    }

    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    pub fn current_path(&self) -> String {
        self.current_path.borrow().clone()
    }

    pub fn is_online(&self) -> bool {
        self.fetcher.is_online()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    pub fn state(&self) -> NavigationState {
        NavigationState {
            current_path: self.current_path(),
            transitioning: self.transitioning.get(),
            phase: self.phase.get(),
        }
    }

    /// Metrics snapshot
    pub fn metrics(&self) -> Metrics {
        self.metrics.borrow().clone()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.borrow().stats()
    }

    pub fn set_debug(&self, debug: bool) {
        self.debug.set(debug);
    }

    // === Events and hooks ===

    pub fn subscribe(&self, listener: impl Fn(&Event) + 'static) -> SubscriptionId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn add_hook(&self, hook: impl RenderHook<H> + 'static) {
        self.hooks.borrow_mut().push(Rc::new(hook));
    }

    // === Link policy ===

    pub fn is_navigable(&self, path: &str) -> bool {
        self.policy.borrow().is_navigable(path, &self.current_path.borrow())
    }

    pub fn allow(&self, reference: &str) {
        self.policy.borrow_mut().allow(reference);
    }

    pub fn forbid_segment(&self, segment: &str) {
        self.policy.borrow_mut().forbid_segment(segment);
    }

    pub fn forbid_prefix(&self, prefix: &str) {
        self.policy.borrow_mut().forbid_prefix(prefix);
    }

    pub fn forbid_path(&self, path: &str) {
        self.policy.borrow_mut().forbid_path(path);
    }

    // === Navigation ===

    /// Navigate in-page to `path`.
    ///
    /// Returns `false` without effects when busy, destroyed, declined by the
    /// link policy or prevented by a `BeforeNavigate` listener. Returns
    /// `false` after falling back to a full load when the attempt fails.
    pub async fn navigate(&self, path: &str) -> bool {
        if self.destroyed.get() {
            return false;
        }
        let admission = self.policy.borrow().evaluate(path, &self.current_path.borrow());
        if let Admission::Reject(reason) = admission {
            step!(self, "declined {}: {:?}", path, reason);
            return false;
        }
        self.attempt(path, HistoryMode::Push).await.unwrap_or(false)
    }

    /// `None` when the attempt never started
    async fn attempt(&self, path: &str, mode: HistoryMode) -> Option<bool> {
        if self.destroyed.get() || self.transitioning.get() {
            step!(self, "rejected {}: navigation in progress", path);
            return None;
        }
        let _guard = TransitionGuard::enter(&self.transitioning, &self.phase);
        let from = self.current_path();

        let before = NavigationEvent::BeforeNavigate { path: path.to_string(), from: from.clone() };
        if !self.events.emit(before, true) {
            step!(self, "navigation to {} prevented by listener", path);
            return None;
        }
        if self.destroyed.get() {
            return Some(false);
        }

        let started = Instant::now();
        match self.resolve_and_render(path, &from, mode, started).await {
            Ok(()) => Some(true),
            Err(_) if self.destroyed.get() => Some(false),
            Err(err) => {
                self.fall_back(err);
                Some(false)
            }
        }
    }

    async fn resolve_and_render(
        &self,
        path: &str,
        from: &str,
        mode: HistoryMode,
        started: Instant,
    ) -> Result<(), NavigationError> {
        let inflight = self.prefetching.borrow().get(path).cloned();
        if let Some(waiter) = inflight {
            self.phase.set(NavPhase::Resolving(Resolution::Fetching));
            step!(self, "waiting for prefetch of {}", path);
            // Closed once the prefetch finishes or is dropped
            let _ = waiter.recv().await;
            self.ensure_alive(path)?;
        }

        let cached = self.cache.borrow_mut().get(path);
        let (markup, from_cache) = match cached {
            Some(markup) => {
                self.phase.set(NavPhase::Resolving(Resolution::CacheHit));
                self.metrics.borrow_mut().cache_hits += 1;
                self.events.emit(NavigationEvent::CacheHit { path: path.to_string() }, false);
                step!(self, "cache hit for {}", path);
                (markup, true)
            }
            None => {
                self.phase.set(NavPhase::Resolving(Resolution::Fetching));
                self.metrics.borrow_mut().cache_misses += 1;
                self.events.emit(NavigationEvent::CacheMiss { path: path.to_string() }, false);
                step!(self, "cache miss for {}, fetching", path);

                let body = self
                    .fetcher
                    .fetch_with_retry(path)
                    .await
                    .map_err(|err| NavigationError::from_fetch(path, err))?;
                self.ensure_alive(path)?;
                let markup: Arc<str> = body.into();
                self.cache.borrow_mut().set(path, markup.clone());
                (markup, false)
            }
        };

        self.render(path, from, &markup, from_cache, mode, started).await
    }

    async fn render(
        &self,
        path: &str,
        from: &str,
        markup: &str,
        from_cache: bool,
        mode: HistoryMode,
        started: Instant,
    ) -> Result<(), NavigationError> {
        self.phase.set(NavPhase::Rendering);

        let fragment = Fragment::parse(markup);
        let Some(region) = fragment.extract(&self.content) else {
            self.cache.borrow_mut().delete(path);
            return Err(self.container_missing(path));
        };
        if !self.host.has_region(&self.content) {
            return Err(self.container_missing(path));
        }

        let ctx = RenderContext {
            path: path.to_string(),
            from: from.to_string(),
            from_cache,
            head: fragment.head_meta(),
        };
        let hooks: Vec<Rc<dyn RenderHook<H>>> = self.hooks.borrow().clone();

        let delay = hooks
            .iter()
            .map(|hook| hook.before_render(&self.host, &ctx))
            .fold(self.config.animation_duration(), Duration::max);
        if !delay.is_zero() {
            smol::Timer::after(delay).await;
            self.ensure_alive(path)?;
        }

        self.host.replace_region(&self.content, &region.markup);
        step!(self, "swapped {} into {}", path, self.content);

        self.host.next_frame().await;
        let report = self.scripts.replay(&self.host, &region.scripts).await;
        self.ensure_alive(path)?;

        for hook in &hooks {
            hook.after_render(&self.host, &ctx);
        }

        if mode == HistoryMode::Push {
            self.host.push_history(&HistoryState::new(path));
        }
        *self.current_path.borrow_mut() = path.to_string();

        let duration = started.elapsed();
        self.metrics.borrow_mut().record_navigation(duration);
        tracing::info!(
            "navigated {} -> {} in {:?}{}",
            from,
            path,
            duration,
            if from_cache { " (cached)" } else { "" }
        );

        self.events.emit(NavigationEvent::ContentLoaded { path: path.to_string(), report }, false);
        self.events.emit(
            NavigationEvent::AfterNavigate {
                path: path.to_string(),
                from: from.to_string(),
                from_cache,
                duration,
            },
            false,
        );
        Ok(())
    }

    fn container_missing(&self, path: &str) -> NavigationError {
        NavigationError::ContainerMissing {
            path: path.to_string(),
            selector: self.content.to_string(),
        }
    }

    /// Fail with a teardown error once `destroy()` ran
    fn ensure_alive(&self, path: &str) -> Result<(), NavigationError> {
        if self.destroyed.get() {
            let error = FetchError::Cancelled { path: path.to_string() };
            return Err(NavigationError::from_fetch(path, error));
        }
        Ok(())
    }

    fn fall_back(&self, err: NavigationError) {
        self.phase.set(NavPhase::Fallback);
        tracing::warn!("{}; falling back to full page load", err);

        self.metrics.borrow_mut().record_error(&err);
        self.events.emit(
            NavigationEvent::Error {
                path: err.path().to_string(),
                kind: err.kind(),
                message: err.to_string(),
                action: err.action(),
            },
            false,
        );
        self.host.full_load(err.path());
    }

    // === Prefetch ===

    /// Fetch `path` into the cache ahead of a navigation.
    ///
    /// Skipped when declined, cached, offline, destroyed or already being
    /// prefetched. Never cancels or waits for a navigation.
    pub async fn prefetch(&self, path: &str) -> bool {
        if self.destroyed.get() || !self.is_online() || !self.is_navigable(path) {
            return false;
        }
        if self.cache.borrow_mut().has(path) {
            step!(self, "prefetch skipped, {} already cached", path);
            return false;
        }
        let Some(slot) = PrefetchSlot::claim(&self.prefetching, path) else {
            return false;
        };

        self.events.emit(NavigationEvent::PrefetchStart { path: path.to_string() }, false);
        self.metrics.borrow_mut().prefetches += 1;

        let result = self.fetcher.fetch_detached(path).await;
        if self.destroyed.get() {
            return false;
        }

        let success = match result {
            Ok(body) => {
                self.cache.borrow_mut().set(path, body);
                true
            }
            Err(err) => {
                step!(self, "prefetch of {} failed: {}", path, err);
                false
            }
        };
        // Release waiters with the cache already filled
        drop(slot);
        let complete = NavigationEvent::PrefetchComplete { path: path.to_string(), success };
        self.events.emit(complete, false);
        success
    }

    /// Prefetch after the pointer rested on a link for `prefetch_delay`.
    ///
    /// A newer hover, `cancel_hover()` or `destroy()` during the wait
    /// supersedes this one.
    pub async fn hover_prefetch(&self, path: &str) -> bool {
        let generation = self.hover_generation.get().wrapping_add(1);
        self.hover_generation.set(generation);

        smol::Timer::after(self.config.prefetch_delay()).await;
        if self.hover_generation.get() != generation {
            return false;
        }
        self.prefetch(path).await
    }

    pub fn cancel_hover(&self) {
        self.hover_generation.set(self.hover_generation.get().wrapping_add(1));
    }

    // === Host input ===

    /// Decide whether a link activation becomes an in-page navigation.
    ///
    /// Returns the path to pass to `navigate`.
    pub fn intercept(&self, activation: &LinkActivation) -> Option<String> {
        if self.destroyed.get()
            || activation.button != MouseButton::Primary
            || activation.any_modifier()
        {
            return None;
        }

        let element = ElementRef::new(&activation.tag, &activation.attrs);
        if !self.links.matches(&element) {
            return None;
        }
        if element
            .attr("target")
            .is_some_and(|t| !t.is_empty() && !t.eq_ignore_ascii_case("_self"))
        {
            return None;
        }
        if element.attr("download").is_some()
            || element.attr(&self.config.opt_out_attribute).is_some()
        {
            return None;
        }

        let href = element.attr("href")?;
        self.is_navigable(href).then(|| href.to_string())
    }

    /// Handle the host moving through session history
    pub async fn handle_popstate(&self, state: Option<&HistoryState>) -> PopOutcome {
        let Some(state) = state.filter(|s| s.spa) else {
            return PopOutcome::External;
        };
        if self.destroyed.get() || *self.current_path.borrow() == state.path {
            return PopOutcome::Ignored;
        }

        match self.attempt(&state.path, HistoryMode::Traverse).await {
            Some(true) => PopOutcome::Navigated,
            Some(false) => PopOutcome::FellBack,
            None => PopOutcome::Ignored,
        }
    }

    /// Record a connectivity change
    pub fn set_online(&self, online: bool) {
        if self.destroyed.get() || self.fetcher.is_online() == online {
            return;
        }
        self.fetcher.set_online(online);
        tracing::info!("connectivity: {}", if online { "online" } else { "offline" });
        let event = if online { NavigationEvent::Online } else { NavigationEvent::Offline };
        self.events.emit(event, false);
    }

    // === Lifecycle ===

    pub fn clear_cache(&self) {
        if self.destroyed.get() {
            return;
        }
        self.cache.borrow_mut().clear();
        self.events.emit(NavigationEvent::CacheCleared, false);
    }

    /// Cancel outstanding work and release all state.
    ///
    /// Every operation afterwards is a no-op.
    pub fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        self.fetcher.cancel_all();
        self.cancel_hover();
        self.cache.borrow_mut().clear();
        self.scripts.clear();
        self.prefetching.borrow_mut().clear();
        self.hooks.borrow_mut().clear();
        self.events.clear();
        tracing::info!("navigator destroyed");
    }
}
