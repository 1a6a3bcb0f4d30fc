//! fnav Engine
//!
//! In-page navigation for server-rendered applications: intercepts
//! navigation, fetches the next page's fragment, swaps it into the content
//! region and replays its scripts. Any unrecoverable failure degrades to a
//! full page load.
//!
//! The live document and history are reached through [`PageHost`];
//! [`HeadlessPage`] implements it in memory.

mod config;
mod error;
mod events;
mod headless;
mod history;
mod hooks;
mod host;
mod interaction;
mod metrics;
mod navigator;

pub use config::{ConfigError, NavigatorConfig};
pub use error::{ErrorKind, NavigationError};
pub use events::{Event, EventBus, NavigationEvent, SubscriptionId};
pub use headless::{ExecutedScript, HeadlessPage};
pub use history::{HistoryEntry, HistoryManager, HistoryState};
pub use hooks::{HeadSync, RenderContext, RenderHook};
pub use host::PageHost;
pub use interaction::{LinkActivation, MouseButton};
pub use metrics::{ErrorRecord, Metrics, RECENT_ERRORS};
pub use navigator::{NavPhase, NavigationState, Navigator, PopOutcome, Resolution};

pub use fnav_admission::{Admission, PolicyConfig, RejectReason};
pub use fnav_cache::CacheStats;
pub use fnav_html::{HeadMeta, Selector};
pub use fnav_net::{FetchError, HttpTransport, MemoryTransport, Transport};
pub use fnav_script::{ReplayReport, ScriptError, ScriptHost, ScriptKind};
