//! Lifecycle events
//!
//! Owned by the navigator; listeners run synchronously in subscription
//! order. Only `BeforeNavigate` is cancelable.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use fnav_script::ReplayReport;

use crate::ErrorKind;

/// Event payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationEvent {
    BeforeNavigate { path: String, from: String },
    AfterNavigate { path: String, from: String, from_cache: bool, duration: Duration },
    ContentLoaded { path: String, report: ReplayReport },
    Error { path: String, kind: ErrorKind, message: String, action: &'static str },
    CacheHit { path: String },
    CacheMiss { path: String },
    CacheCleared,
    PrefetchStart { path: String },
    PrefetchComplete { path: String, success: bool },
    Online,
    Offline,
}

impl NavigationEvent {
    /// Stable wire name
    pub fn name(&self) -> &'static str {
        match self {
            NavigationEvent::BeforeNavigate { .. } => "spa:before-navigate",
            NavigationEvent::AfterNavigate { .. } => "spa:after-navigate",
            NavigationEvent::ContentLoaded { .. } => "spa:content-loaded",
            NavigationEvent::Error { .. } => "spa:error",
            NavigationEvent::CacheHit { .. } => "spa:cache-hit",
            NavigationEvent::CacheMiss { .. } => "spa:cache-miss",
            NavigationEvent::CacheCleared => "spa:cache-cleared",
            NavigationEvent::PrefetchStart { .. } => "spa:prefetch-start",
            NavigationEvent::PrefetchComplete { .. } => "spa:prefetch-complete",
            NavigationEvent::Online => "spa:online",
            NavigationEvent::Offline => "spa:offline",
        }
    }
}

/// Event as seen by listeners
#[derive(Debug)]
pub struct Event {
    pub payload: NavigationEvent,
    cancelable: bool,
    default_prevented: Cell<bool>,
}

impl Event {
    fn new(payload: NavigationEvent, cancelable: bool) -> Self {
        Self {
            payload,
            cancelable,
            default_prevented: Cell::new(false),
        }
    }

    pub fn name(&self) -> &'static str {
        self.payload.name()
    }

    pub fn is_cancelable(&self) -> bool {
        self.cancelable
    }

    /// Prevent default action. Ignored on non-cancelable events.
    pub fn prevent_default(&self) {
        if self.cancelable {
            self.default_prevented.set(true);
        }
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented.get()
    }
}

/// Handle returned by `subscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Rc<dyn Fn(&Event)>;

/// Synchronous event bus
#[derive(Default)]
pub struct EventBus {
    listeners: RefCell<Vec<(SubscriptionId, Listener)>>,
    next_id: Cell<u64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl Fn(&Event) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(other, _)| *other != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn clear(&self) {
        self.listeners.borrow_mut().clear();
    }

    /// Dispatch to every listener. Returns `false` if a listener prevented
    /// the default action.
    pub fn emit(&self, payload: NavigationEvent, cancelable: bool) -> bool {
        // Listeners may subscribe or unsubscribe while running
        let listeners: Vec<Listener> =
            self.listeners.borrow().iter().map(|(_, l)| l.clone()).collect();
        let event = Event::new(payload, cancelable);
        for listener in listeners {
            listener(&event);
        }
        !event.is_default_prevented()
    }
}
