//! End-to-end readiness scenarios: the shared deadline budget,
//! precondition-specific failures, staleness recovery, and the error
//! taxonomy as seen by a caller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use driver_bridge::fixture::FixtureDriver;
use elemental::{
    build_plan, normalize, By, ElementKind, EngineConfig, Page, QueryPlan, ReadinessError,
    Selector, SelectorValue,
};

fn quick_config() -> EngineConfig {
    EngineConfig::default()
        .with_timeout(Duration::from_millis(150))
        .with_poll_interval(Duration::from_millis(10))
}

/// Compile the selector the way the engine will and script the fixture
/// to answer that exact expression.
fn route_structural(fx: &FixtureDriver, kind: ElementKind, selector: &Selector, nodes: Vec<elemental::NodeId>) {
    let normalized = normalize(kind, selector).unwrap();
    match build_plan(&normalized).unwrap() {
        QueryPlan::Structural { expr, .. } => fx.route(By::XPath, &expr, nodes),
        other => panic!("expected a structural plan, got {other:?}"),
    }
}

#[tokio::test]
async fn disabled_is_distinguishable_from_never_found() {
    let fx = Arc::new(FixtureDriver::new());
    let checkbox = fx
        .node("input")
        .attr("type", "checkbox")
        .attr("name", "interests majority")
        .attr("value", "cars")
        .disabled()
        .insert();
    let selector = Selector::new()
        .with("name", "interests majority")
        .with("value", "cars");
    route_structural(&fx, ElementKind::CheckBox, &selector, vec![checkbox]);
    let page = Page::new(fx, quick_config());

    let element = page.checkbox(selector);
    let err = element.wait_for_enabled().await.unwrap_err();
    assert!(
        matches!(err, ReadinessError::Disabled { .. }),
        "a located-but-disabled element must not report as not-found: {err}"
    );
    assert!(!err.is_not_found());
    let message = err.to_string();
    assert!(message.starts_with("element located, but timed out after"));
    assert!(message.contains(r#"name: "interests majority""#));
    assert!(message.ends_with("to become enabled"));
}

#[tokio::test]
async fn zero_timeout_reports_read_only_without_polling() {
    let fx = Arc::new(FixtureDriver::new());
    fx.node("input")
        .attr("id", "notes")
        .read_only()
        .insert();
    let page = Page::new(
        fx,
        quick_config().with_timeout(Duration::ZERO),
    );

    let field = page.text_field(Selector::new().with("id", "notes"));
    let start = Instant::now();
    let err = field.wait_for_writable().await.unwrap_err();
    assert!(
        matches!(err, ReadinessError::ReadOnly { .. }),
        "expected the read-only kind, got {err}"
    );
    assert!(
        start.elapsed() < Duration::from_millis(50),
        "zero timeout means one synchronous probe, no polling"
    );
}

#[tokio::test]
async fn nested_waits_share_one_deadline() {
    let fx = Arc::new(FixtureDriver::new());
    let page = Page::new(fx, quick_config());

    let child = page
        .div(Selector::new().with("id", "missing-parent"))
        .element(ElementKind::Generic, Selector::new().with("id", "leaf"));

    let start = Instant::now();
    let err = child.wait_for_exists().await.unwrap_err();
    let elapsed = start.elapsed();

    // ancestor-first: the nearest missing scope takes the blame
    let message = err.to_string();
    assert!(
        message.contains("missing-parent"),
        "failure must blame the missing ancestor: {message}"
    );
    assert!(
        !message.contains("leaf"),
        "the leaf never got a turn to be blamed: {message}"
    );

    // the parent's wait and the child's own wait ran under one budget
    assert!(
        elapsed < Duration::from_millis(150 + 100),
        "nested waits exceeded the shared budget: {elapsed:?}"
    );
    assert!(elapsed >= Duration::from_millis(150));
}

#[tokio::test]
async fn stale_handle_is_retried_exactly_once() {
    let fx = Arc::new(FixtureDriver::new());
    let old = fx.node("button").attr("id", "go").insert();
    let page = Page::new(fx.clone(), quick_config());

    let button = page.button(Selector::new().with("id", "go"));
    button.wait_for_exists().await.unwrap();

    // the first interaction detaches the handle mid-call
    fx.invalidate_on_interaction(&old);
    let fresh = fx.node("button").attr("id", "go").insert();
    button.click().await.unwrap();
    assert_eq!(
        fx.clicks(),
        vec![fresh.clone()],
        "the interaction must complete on the relocated handle"
    );

    // a second staleness in the same interaction is not retried again
    fx.invalidate_on_interaction(&fresh);
    let trap = fx.node("button").attr("id", "go").insert();
    fx.invalidate_on_interaction(&trap);
    let err = button.click().await.unwrap_err();
    assert!(
        matches!(err, ReadinessError::Backend { .. }),
        "double staleness must surface, got {err}"
    );
}

#[tokio::test]
async fn not_interactable_is_polled_under_enabled_precondition() {
    let fx = Arc::new(FixtureDriver::new());
    let button = fx.node("button").attr("id", "go").insert();
    fx.not_interactable_for(&button, 2);
    let page = Page::new(fx.clone(), quick_config());

    page.button(Selector::new().with("id", "go"))
        .click()
        .await
        .unwrap();
    assert_eq!(
        fx.clicks(),
        vec![button],
        "the click must land once the node becomes interactable"
    );
}

#[tokio::test]
async fn window_closure_surfaces_as_window_gone() {
    let fx = Arc::new(FixtureDriver::new());
    fx.node("div").attr("id", "x").insert();
    let page = Page::new(fx.clone(), quick_config());
    let element = page.div(Selector::new().with("id", "x"));
    element.wait_for_exists().await.unwrap();

    fx.close_window();
    let err = element.exists().await.unwrap_err();
    assert!(
        matches!(err, ReadinessError::WindowGone { .. }),
        "expected the window-gone kind, got {err}"
    );
}

#[tokio::test]
async fn missing_frame_boundary_reports_frame_not_found() {
    let fx = Arc::new(FixtureDriver::new());
    let page = Page::new(fx, quick_config());

    let inside = page
        .frame(Selector::new().with("id", "payments"))
        .element(ElementKind::Generic, Selector::new().with("id", "amount"));
    let err = inside.wait_for_exists().await.unwrap_err();
    assert!(
        matches!(err, ReadinessError::FrameNotFound { .. }),
        "a missing frame boundary has its own kind: {err}"
    );
    assert!(err.to_string().contains("payments"));
}

#[tokio::test]
async fn selecting_an_absent_option_reports_no_value_matched() {
    let fx = Arc::new(FixtureDriver::new());
    let list = fx.node("select").attr("id", "pets").insert();
    let cat = fx
        .node("option")
        .attr("value", "cat")
        .text("Cat")
        .child_of(&list)
        .insert();
    fx.node("option")
        .attr("value", "fish")
        .text("Fish")
        .child_of(&list)
        .insert();
    let page = Page::new(fx.clone(), quick_config());

    let select = page.select_list(Selector::new().with("id", "pets"));
    select
        .select_option(&SelectorValue::from("cat"))
        .await
        .unwrap();
    assert_eq!(fx.clicks(), vec![cat], "the matching option gets clicked");

    let err = select
        .select_option(&SelectorValue::from("dog"))
        .await
        .unwrap_err();
    assert!(
        matches!(err, ReadinessError::NoValueMatched { .. }),
        "zero matching options has its own kind: {err}"
    );
    assert!(err.to_string().contains("dog"));
}

#[tokio::test]
async fn typing_goes_through_the_writable_precondition() {
    let fx = Arc::new(FixtureDriver::new());
    let field = fx.node("input").attr("id", "q").insert();
    let page = Page::new(fx.clone(), quick_config());

    let element = page.text_field(Selector::new().with("id", "q"));
    element.set_text("hello").await.unwrap();
    assert_eq!(
        fx.queries().first().map(|q| q.by),
        Some(By::Id),
        "the identifier fast path serves interactions too"
    );
    assert!(fx.clicks().is_empty(), "typing must not click");

    element.clear().await.unwrap();
    let _ = field;
}
