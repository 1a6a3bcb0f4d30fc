//! Render hooks
//!
//! Collaborators such as transitions or head synchronization plug in around
//! the region swap. Hooks run synchronously in registration order.

use std::time::Duration;

use fnav_html::HeadMeta;

use crate::PageHost;

/// What is being rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderContext {
    pub path: String,
    pub from: String,
    pub from_cache: bool,
    pub head: HeadMeta,
}

/// Hook around the region swap
pub trait RenderHook<H> {
    fn name(&self) -> &str;

    /// Called before the swap. The navigator waits for the longest delay
    /// any hook (or the configured animation duration) asks for.
    fn before_render(&self, _host: &H, _ctx: &RenderContext) -> Duration {
        Duration::ZERO
    }

    /// Called after scripts were replayed
    fn after_render(&self, _host: &H, _ctx: &RenderContext) {}
}

/// Copies title, description and canonical link into the live document
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadSync;

impl<H: PageHost> RenderHook<H> for HeadSync {
    fn name(&self) -> &str {
        "head-sync"
    }

    fn after_render(&self, host: &H, ctx: &RenderContext) {
        if let Some(title) = &ctx.head.title {
            host.set_title(title);
        }
        if let Some(description) = &ctx.head.description {
            host.set_meta_description(description);
        }
        if let Some(canonical) = &ctx.head.canonical {
            host.set_canonical(canonical);
        }
    }
}
