//! Navigator integration tests
//!
//! Full navigations against a headless page and an in-memory transport.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use fnav_engine::*;
use fnav_net::Failure;

const REGION: &str = "#spa-content";

fn page(body: &str) -> String {
    format!(
        concat!(
            r#"<!DOCTYPE html><html><head><title>{0}</title></head>"#,
            r#"<body><nav>menu</nav><div id="spa-content">{0}</div></body></html>"#,
        ),
        body
    )
}

fn config() -> NavigatorConfig {
    NavigatorConfig {
        animation_duration_ms: 0,
        retry_base_delay_ms: 5,
        fetch_timeout_ms: 200,
        prefetch_delay_ms: 30,
        ..Default::default()
    }
}

fn navigator_with(
    config: NavigatorConfig,
    transport: MemoryTransport,
) -> Navigator<HeadlessPage, MemoryTransport> {
    let host = HeadlessPage::new("/").with_region(REGION, "home");
    Navigator::new(config, host, transport).unwrap()
}

fn navigator(transport: MemoryTransport) -> Navigator<HeadlessPage, MemoryTransport> {
    navigator_with(config(), transport)
}

fn record(nav: &Navigator<HeadlessPage, MemoryTransport>) -> Rc<RefCell<Vec<NavigationEvent>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    nav.subscribe(move |e| sink.borrow_mut().push(e.payload.clone()));
    events
}

fn names(events: &Rc<RefCell<Vec<NavigationEvent>>>) -> Vec<&'static str> {
    events.borrow().iter().map(|e| e.name()).collect()
}

// ============================================================================
// LIFECYCLE TESTS
// ============================================================================

#[test]
fn test_event_sequence_for_fetched_page() {
    let nav = navigator(MemoryTransport::new().route("/a", &page("A")));
    let events = record(&nav);

    assert!(smol::block_on(nav.navigate("/a")));
    assert_eq!(
        names(&events),
        vec!["spa:before-navigate", "spa:cache-miss", "spa:content-loaded", "spa:after-navigate"]
    );
    assert_eq!(nav.host().region(REGION).as_deref(), Some("A"));

    let history = nav.host().history();
    assert_eq!(history.len(), 2);
    assert_eq!(history.current().spa_state(), Some(HistoryState::new("/a")));
}

#[test]
fn test_before_navigate_can_cancel() {
    let nav = navigator(MemoryTransport::new().route("/a", &page("A")));
    nav.subscribe(|e| {
        if let NavigationEvent::BeforeNavigate { path, .. } = &e.payload {
            if path == "/a" {
                e.prevent_default();
            }
        }
    });

    assert!(!smol::block_on(nav.navigate("/a")));
    assert_eq!(nav.transport().request_count(), 0);
    assert_eq!(nav.current_path(), "/");
    assert!(!nav.state().transitioning);
}

#[test]
fn test_concurrent_navigate_rejected() {
    let transport = MemoryTransport::new().route("/a", &page("A")).route("/b", &page("B"));
    transport.set_latency(Duration::from_millis(20));
    let nav = navigator(transport);

    let (first, second) = smol::block_on(smol::future::zip(nav.navigate("/a"), nav.navigate("/b")));

    assert!(first);
    assert!(!second);
    assert_eq!(nav.transport().requests_for("/b"), 0);
    assert_eq!(nav.current_path(), "/a");
}

#[test]
fn test_animation_delay_before_swap() {
    let nav = navigator_with(
        NavigatorConfig { animation_duration_ms: 30, ..config() },
        MemoryTransport::new().route("/a", &page("A")),
    );

    let start = Instant::now();
    assert!(smol::block_on(nav.navigate("/a")));
    assert!(start.elapsed() >= Duration::from_millis(30));
    assert!(nav.metrics().average_load_time_ms >= 30.0);
}

#[test]
fn test_head_sync_hook() {
    let nav = navigator(MemoryTransport::new().route(
        "/a",
        r#"<html><head><title>Orders</title><meta name="description" content="All orders"></head>
<body><div id="spa-content">A</div></body></html>"#,
    ));
    nav.add_hook(HeadSync);

    assert!(smol::block_on(nav.navigate("/a")));
    let head = nav.host().head();
    assert_eq!(head.title.as_deref(), Some("Orders"));
    assert_eq!(head.description.as_deref(), Some("All orders"));
    assert_eq!(head.canonical, None);
}

// ============================================================================
// FALLBACK TESTS
// ============================================================================

#[test]
fn test_missing_region_falls_back() {
    let transport = MemoryTransport::new().route("/broken", r#"<div id="other">no region</div>"#);
    let nav = navigator(transport);
    let events = record(&nav);

    assert!(!smol::block_on(nav.navigate("/broken")));

    assert_eq!(nav.host().full_loads(), vec!["/broken"]);
    assert_eq!(nav.host().region(REGION).as_deref(), Some("home"));
    let error = events
        .borrow()
        .iter()
        .find_map(|e| match e {
            NavigationEvent::Error { kind, action, .. } => Some((*kind, *action)),
            _ => None,
        })
        .unwrap();
    assert_eq!(error, (ErrorKind::ContainerMissing, "render"));
    assert!(nav.cache_stats().keys.is_empty());
    assert_eq!(nav.metrics().errors, 1);
}

#[test]
fn test_missing_live_region_falls_back() {
    let host = HeadlessPage::new("/");
    let transport = MemoryTransport::new().route("/a", &page("A"));
    let nav = Navigator::new(config(), host, transport).unwrap();

    assert!(!smol::block_on(nav.navigate("/a")));
    assert_eq!(nav.metrics().recent_errors[0].kind, ErrorKind::ContainerMissing);
    assert_eq!(nav.host().full_loads(), vec!["/a"]);
}

#[test]
fn test_transient_failures_then_success() {
    let transport = MemoryTransport::new().route("/a", &page("A"));
    transport.fail_next(Failure::Status(503));
    transport.fail_next(Failure::Network("reset".into()));
    let nav = navigator(transport);

    let start = Instant::now();
    assert!(smol::block_on(nav.navigate("/a")));

    // Backoff of 5ms then 10ms
    assert!(start.elapsed() >= Duration::from_millis(15));
    assert_eq!(nav.transport().request_count(), 3);
    assert!(nav.host().full_loads().is_empty());
}

#[test]
fn test_exhausted_retries_fall_back() {
    let transport = MemoryTransport::new();
    for _ in 0..3 {
        transport.fail_next(Failure::Status(500));
    }
    let nav = navigator(transport);

    assert!(!smol::block_on(nav.navigate("/a")));

    let metrics = nav.metrics();
    assert_eq!(metrics.errors, 1);
    assert_eq!(metrics.recent_errors[0].kind, ErrorKind::Network);
    assert_eq!(metrics.recent_errors[0].path, "/a");
    assert_eq!(metrics.recent_errors[0].action, "fetch");
    assert_eq!(nav.transport().request_count(), 3);
    assert_eq!(nav.host().full_loads(), vec!["/a"]);
}

// ============================================================================
// CACHE & PREFETCH TESTS
// ============================================================================

#[test]
fn test_prefetch_then_navigate_hits_cache() {
    let nav = navigator(MemoryTransport::new().route("/a", &page("A")));
    let events = record(&nav);

    smol::block_on(async {
        assert!(nav.prefetch("/a").await);
        assert!(!nav.prefetch("/a").await);
        assert!(nav.navigate("/a").await);
    });

    assert_eq!(nav.transport().request_count(), 1);
    let metrics = nav.metrics();
    assert_eq!(metrics.prefetches, 1);
    assert_eq!(metrics.cache_hits, 1);
    assert_eq!(metrics.cache_misses, 0);
    assert!(names(&events).contains(&"spa:cache-hit"));
    let complete = NavigationEvent::PrefetchComplete { path: "/a".into(), success: true };
    assert!(events.borrow().contains(&complete));
}

#[test]
fn test_prefetch_during_navigation() {
    let transport = MemoryTransport::new().route("/a", &page("A")).route("/b", &page("B"));
    transport.set_latency(Duration::from_millis(15));
    let nav = navigator(transport);

    let (navigated, prefetched) =
        smol::block_on(smol::future::zip(nav.navigate("/a"), nav.prefetch("/b")));

    assert!(navigated);
    assert!(prefetched);
    assert_eq!(nav.cache_stats().size, 2);
}

#[test]
fn test_navigate_waits_for_inflight_prefetch() {
    let transport = MemoryTransport::new().route("/a", &page("A"));
    transport.set_latency(Duration::from_millis(20));
    let nav = navigator(transport);

    let (prefetched, navigated) = smol::block_on(smol::future::zip(nav.prefetch("/a"), async {
        smol::Timer::after(Duration::from_millis(5)).await;
        nav.navigate("/a").await
    }));

    assert!(prefetched);
    assert!(navigated);
    assert_eq!(nav.transport().request_count(), 1);
    assert_eq!(nav.metrics().cache_hits, 1);
    assert_eq!(nav.metrics().cache_misses, 0);
}

#[test]
fn test_prefetch_declined_and_offline() {
    let nav = navigator(MemoryTransport::new().route("/a", &page("A")));

    assert!(!smol::block_on(nav.prefetch("/admin/users")));
    nav.set_online(false);
    assert!(!smol::block_on(nav.prefetch("/a")));
    assert_eq!(nav.transport().request_count(), 0);
    assert_eq!(nav.metrics().prefetches, 0);
}

#[test]
fn test_clear_cache() {
    let nav = navigator(MemoryTransport::new().route("/a", &page("A")).route("/b", &page("B")));
    let events = record(&nav);

    smol::block_on(async {
        nav.navigate("/a").await;
        nav.navigate("/b").await;
        nav.clear_cache();
        nav.navigate("/a").await;
    });

    assert!(names(&events).contains(&"spa:cache-cleared"));
    assert_eq!(nav.transport().requests_for("/a"), 2);
}

#[test]
fn test_hover_debounce_supersedes() {
    let nav = navigator(MemoryTransport::new().route("/a", &page("A")).route("/b", &page("B")));

    let (first, second) = smol::block_on(smol::future::zip(nav.hover_prefetch("/a"), async {
        smol::Timer::after(Duration::from_millis(10)).await;
        nav.hover_prefetch("/b").await
    }));

    assert!(!first);
    assert!(second);
    assert_eq!(nav.transport().requests_for("/a"), 0);
    assert_eq!(nav.transport().requests_for("/b"), 1);
}

#[test]
fn test_cancel_hover() {
    let nav = navigator(MemoryTransport::new().route("/a", &page("A")));

    let (hovered, _) = smol::block_on(smol::future::zip(nav.hover_prefetch("/a"), async {
        smol::Timer::after(Duration::from_millis(5)).await;
        nav.cancel_hover();
    }));

    assert!(!hovered);
    assert_eq!(nav.transport().request_count(), 0);
}

// ============================================================================
// SCRIPT TESTS
// ============================================================================

#[test]
fn test_scripts_replayed_in_order_once() {
    let body = concat!(
        r#"<p>x</p><script src="/js/app.js"></script>"#,
        r#"<script>init()</script><script type="module">boot()</script>"#,
    );
    let nav = navigator(MemoryTransport::new().route("/a", &page(body)).route("/b", &page(body)));

    smol::block_on(async {
        assert!(nav.navigate("/a").await);
        assert!(nav.navigate("/b").await);
    });

    let executed = nav.host().executed();
    let externals = executed
        .iter()
        .filter(|s| matches!(s, ExecutedScript::External { .. }))
        .count();
    assert_eq!(externals, 1);
    assert_eq!(executed.len(), 5);
    assert_eq!(
        executed[0],
        ExecutedScript::External { src: "/js/app.js".into(), kind: ScriptKind::Classic }
    );
    assert_eq!(
        executed[1],
        ExecutedScript::Inline { code: "init()".into(), kind: ScriptKind::Classic }
    );
    assert!(matches!(
        &executed[2],
        ExecutedScript::Inline { code, kind: ScriptKind::Module } if code.starts_with("boot()")
    ));
    assert_eq!(nav.host().region(REGION).as_deref(), Some("<p>x</p>"));
}

#[test]
fn test_script_errors_do_not_fail_navigation() {
    let body = r#"<script>let app = 1;</script><script>broken()</script>ok"#;
    let nav = navigator(MemoryTransport::new().route("/a", &page(body)));
    nav.host().throw_on("let app", "SyntaxError: Identifier 'app' has already been declared");
    nav.host().throw_on("broken", "TypeError: broken is not a function");
    let events = record(&nav);

    assert!(smol::block_on(nav.navigate("/a")));

    let report = events
        .borrow()
        .iter()
        .find_map(|e| match e {
            NavigationEvent::ContentLoaded { report, .. } => Some(report.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(report.executed, 1);
    assert_eq!(
        report.failed,
        vec![ScriptError::Execution("TypeError: broken is not a function".into())]
    );
    assert_eq!(nav.metrics().errors, 0);
}

#[test]
fn test_stalled_module_times_out_when_configured() {
    let nav = navigator_with(
        NavigatorConfig { module_timeout_ms: Some(20), ..config() },
        MemoryTransport::new().route("/a", &page(r#"<script type="module">hang()</script>"#)),
    );
    nav.host().stall_modules(true);
    nav.host().set_frame_duration(Duration::from_millis(2));

    assert!(smol::block_on(nav.navigate("/a")));
    assert_eq!(nav.current_path(), "/a");
}

// ============================================================================
// HISTORY & INTERACTION TESTS
// ============================================================================

#[test]
fn test_popstate_navigates_without_push() {
    let nav = navigator(
        MemoryTransport::new()
            .route("/", &page("Home"))
            .route("/a", &page("A"))
            .route("/b", &page("B")),
    );

    smol::block_on(async {
        assert!(nav.navigate("/a").await);
        assert!(nav.navigate("/b").await);

        let state = nav.host().go_back().unwrap();
        assert_eq!(nav.handle_popstate(state.as_ref()).await, PopOutcome::Navigated);
        assert_eq!(nav.current_path(), "/a");

        let state = nav.host().go_back().unwrap();
        assert_eq!(nav.handle_popstate(state.as_ref()).await, PopOutcome::Navigated);
    });

    assert_eq!(nav.host().history().len(), 3);
    assert_eq!(nav.host().region(REGION).as_deref(), Some("Home"));
    assert_eq!(nav.metrics().cache_hits, 1);
}

#[test]
fn test_popstate_foreign_entry() {
    let nav = navigator(MemoryTransport::new());

    assert_eq!(smol::block_on(nav.handle_popstate(None)), PopOutcome::External);
    let foreign = HistoryState { path: "/x".into(), spa: false };
    assert_eq!(smol::block_on(nav.handle_popstate(Some(&foreign))), PopOutcome::External);
    let same = HistoryState::new("/");
    assert_eq!(smol::block_on(nav.handle_popstate(Some(&same))), PopOutcome::Ignored);
}

#[test]
fn test_intercept_rules() {
    let nav = navigator(MemoryTransport::new());

    assert_eq!(nav.intercept(&LinkActivation::click("/orders")), Some("/orders".into()));
    assert_eq!(
        nav.intercept(&LinkActivation::click("/orders").with_attr("target", "_self")),
        Some("/orders".into())
    );

    let mut ctrl = LinkActivation::click("/orders");
    ctrl.ctrl_key = true;
    assert_eq!(nav.intercept(&ctrl), None);
    let middle_click = LinkActivation::click("/orders").with_button(MouseButton::Auxiliary);
    assert_eq!(nav.intercept(&middle_click), None);
    let new_tab = LinkActivation::click("/orders").with_attr("target", "_blank");
    assert_eq!(nav.intercept(&new_tab), None);
    let download = LinkActivation::click("/report.pdf").with_attr("download", "");
    assert_eq!(nav.intercept(&download), None);
    assert_eq!(nav.intercept(&LinkActivation::click("/orders").with_attr("data-no-spa", "")), None);
    assert_eq!(nav.intercept(&LinkActivation::click("/api/users")), None);
    assert_eq!(nav.intercept(&LinkActivation::click("https://example.com/")), None);
    assert_eq!(nav.intercept(&LinkActivation::click("#top")), None);
    assert_eq!(nav.intercept(&LinkActivation::click("/")), None);

    let div = LinkActivation { tag: "div".into(), ..LinkActivation::click("/orders") };
    assert_eq!(nav.intercept(&div), None);
}

#[test]
fn test_runtime_policy_changes() {
    let nav = navigator(MemoryTransport::new());

    assert!(!nav.is_navigable("/api/docs"));
    nav.allow("/api/docs");
    assert!(nav.is_navigable("/api/docs"));

    assert!(nav.is_navigable("/reports/2024"));
    nav.forbid_segment("reports");
    assert!(!nav.is_navigable("/reports/2024"));
}

#[test]
fn test_connectivity_events() {
    let nav = navigator(MemoryTransport::new());
    let events = record(&nav);

    nav.set_online(false);
    nav.set_online(false);
    nav.set_online(true);

    assert_eq!(names(&events), vec!["spa:offline", "spa:online"]);
    assert!(nav.is_online());
}

// ============================================================================
// DESTROY TESTS
// ============================================================================

#[test]
fn test_destroy_makes_operations_noops() {
    let nav = navigator(MemoryTransport::new().route("/a", &page("A")));
    nav.destroy();

    assert!(nav.is_destroyed());
    assert!(!smol::block_on(nav.navigate("/a")));
    assert!(!smol::block_on(nav.prefetch("/a")));
    assert!(!smol::block_on(nav.hover_prefetch("/a")));
    assert_eq!(nav.intercept(&LinkActivation::click("/a")), None);
    assert_eq!(nav.transport().request_count(), 0);
}

#[test]
fn test_destroy_during_fetch_skips_fallback() {
    let transport = MemoryTransport::new().route("/a", &page("A"));
    transport.fail_next(Failure::Hang);
    let nav = navigator(transport);

    let (navigated, _) = smol::block_on(smol::future::zip(nav.navigate("/a"), async {
        smol::Timer::after(Duration::from_millis(10)).await;
        nav.destroy();
    }));

    assert!(!navigated);
    assert!(nav.host().full_loads().is_empty());
    assert_eq!(nav.metrics().errors, 0);
    assert_eq!(nav.transport().request_count(), 1);
}

#[test]
fn test_destroy_from_before_navigate_listener() {
    let nav = Rc::new(navigator(MemoryTransport::new().route("/a", &page("A"))));
    let weak = Rc::downgrade(&nav);
    nav.subscribe(move |event| {
        if matches!(event.payload, NavigationEvent::BeforeNavigate { .. }) {
            if let Some(nav) = weak.upgrade() {
                nav.destroy();
            }
        }
    });

    assert!(!smol::block_on(nav.navigate("/a")));
    assert!(nav.is_destroyed());
    assert_eq!(nav.transport().request_count(), 0);
    assert!(nav.host().full_loads().is_empty());
    assert_eq!(nav.host().region(REGION).as_deref(), Some("home"));
}

#[test]
fn test_destroy_during_script_replay() {
    let body = concat!(
        r#"<p>x</p><script src="/one.js"></script>"#,
        r#"<script src="/two.js"></script><script>three()</script>"#,
    );
    let nav = navigator(MemoryTransport::new().route("/a", &page(body)));
    nav.host().set_load_latency(Duration::from_millis(20));

    let (navigated, _) = smol::block_on(smol::future::zip(nav.navigate("/a"), async {
        smol::Timer::after(Duration::from_millis(10)).await;
        nav.destroy();
    }));

    assert!(!navigated);
    // Only the script already loading when destroyed lands
    assert_eq!(
        nav.host().executed(),
        vec![ExecutedScript::External { src: "/one.js".into(), kind: ScriptKind::Classic }]
    );
    assert!(nav.host().full_loads().is_empty());
    assert_eq!(nav.metrics().navigations, 0);
}
