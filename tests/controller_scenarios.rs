//! Mode controller: startup, toggling and direct submission.

mod support;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use handoff_core::{
    AgentError, CheckOrder, MemoryModeStore, Mode, ModeController, ModeStore, StoreError,
    SuspendStrategy,
};
use support::{BrowserCall, FakeAgent, Harness, UiCall};

fn controller(h: &Harness, store: Arc<MemoryModeStore>) -> ModeController {
    ModeController::new(&h.engine, store)
}

fn harness(agent: Arc<FakeAgent>) -> Harness {
    Harness::new(SuspendStrategy::Cancel, agent, Mode::Auto, CheckOrder::CheckFirst)
}

#[tokio::test]
async fn test_start_restores_disabled_and_detaches_listener() {
    let h = harness(FakeAgent::healthy());
    let store = Arc::new(MemoryModeStore::with_raw(0));
    let controller = controller(&h, store);

    assert_eq!(controller.start().await, Mode::Disabled);

    assert_eq!(h.engine.mode().get(), Mode::Disabled);
    assert_eq!(h.browser.calls(), vec![BrowserCall::Listener(false)]);
    assert_eq!(h.ui.calls(), vec![UiCall::ShowMode(Mode::Disabled)]);
}

#[tokio::test]
async fn test_start_with_missing_or_invalid_value_uses_auto() {
    for store in [MemoryModeStore::new(), MemoryModeStore::with_raw(17)] {
        let h = harness(FakeAgent::healthy());
        let controller = controller(&h, Arc::new(store));

        assert_eq!(controller.start().await, Mode::Auto);
        assert_eq!(h.browser.calls(), vec![BrowserCall::Listener(true)]);
        assert_eq!(h.ui.calls(), vec![UiCall::ShowMode(Mode::Auto)]);
    }
}

/// Store whose database is always locked for writing.
struct LockedStore;

#[async_trait]
impl ModeStore for LockedStore {
    async fn load_raw(&self) -> Result<Option<i64>, StoreError> {
        Ok(Some(Mode::Manual.as_stored()))
    }

    async fn save(&self, _mode: Mode) -> Result<(), StoreError> {
        Err(StoreError::Database {
            busy: true,
            message: "database is locked".to_string(),
        })
    }
}

#[tokio::test]
async fn test_restore_loads_mode_without_host_calls() {
    let h = harness(FakeAgent::healthy());
    let controller = controller(&h, Arc::new(MemoryModeStore::with_raw(0)));

    assert_eq!(controller.restore().await, Mode::Disabled);

    assert_eq!(h.engine.mode().get(), Mode::Disabled);
    assert!(h.browser.calls().is_empty());
    assert!(h.ui.calls().is_empty());

    assert_eq!(controller.announce().await, Mode::Disabled);
    assert_eq!(h.browser.calls(), vec![BrowserCall::Listener(false)]);
    assert_eq!(h.ui.calls(), vec![UiCall::ShowMode(Mode::Disabled)]);
}

#[tokio::test]
async fn test_toggle_applies_mode_when_store_is_locked() {
    let h = harness(FakeAgent::healthy());
    let controller = ModeController::new(&h.engine, Arc::new(LockedStore));
    controller.start().await;
    h.browser.clear();

    assert_eq!(controller.toggle().await, Mode::Auto);

    assert_eq!(h.engine.mode().get(), Mode::Auto);
    assert_eq!(h.browser.calls(), vec![BrowserCall::Listener(true)]);
}

#[tokio::test]
async fn test_toggle_cycles_modes_and_persists() {
    let h = harness(FakeAgent::healthy());
    let store = Arc::new(MemoryModeStore::new());
    let controller = controller(&h, store.clone());
    controller.start().await;
    h.browser.clear();

    let mut seen = Vec::new();
    for _ in 0..3 {
        let mode = controller.toggle().await;
        assert_eq!(store.load().await, mode);
        assert_eq!(h.engine.mode().get(), mode);
        seen.push(mode);
    }

    assert_eq!(seen, vec![Mode::Disabled, Mode::Manual, Mode::Auto]);
    assert_eq!(
        h.browser.calls(),
        vec![
            BrowserCall::Listener(false),
            BrowserCall::Listener(true),
            BrowserCall::Listener(true),
        ]
    );
    assert_eq!(
        h.ui.calls()[1..],
        [
            UiCall::ShowMode(Mode::Disabled),
            UiCall::ShowMode(Mode::Manual),
            UiCall::ShowMode(Mode::Auto),
        ]
    );
}

#[tokio::test]
async fn test_toggle_resets_failure_cooldown() {
    let h = harness(FakeAgent::healthy());
    let controller = controller(&h, Arc::new(MemoryModeStore::new()));
    h.engine.availability().mark_failed();
    assert!(h.engine.availability().is_in_cooldown());

    controller.toggle().await;

    assert!(!h.engine.availability().is_in_cooldown());
}

#[tokio::test]
async fn test_concurrent_toggles_never_lose_a_transition() {
    let h = harness(FakeAgent::healthy());
    let store = Arc::new(MemoryModeStore::new());
    let controller = controller(&h, store.clone());
    controller.start().await;

    let (a, b, c, d) = tokio::join!(
        controller.toggle(),
        controller.toggle(),
        controller.toggle(),
        controller.toggle()
    );

    let mut results = vec![a, b, c, d];
    results.sort_by_key(|mode| mode.as_stored());
    assert_eq!(
        results,
        vec![Mode::Disabled, Mode::Disabled, Mode::Manual, Mode::Auto]
    );
    assert_eq!(controller.mode(), Mode::Disabled);
    assert_eq!(store.load().await, Mode::Disabled);
}

#[tokio::test]
async fn test_set_mode_jumps_directly() {
    let h = harness(FakeAgent::healthy());
    let store = Arc::new(MemoryModeStore::new());
    let controller = controller(&h, store.clone());

    assert_eq!(controller.set_mode(Mode::Manual).await, Mode::Manual);
    assert_eq!(store.load().await, Mode::Manual);
    assert_eq!(h.browser.calls(), vec![BrowserCall::Listener(true)]);
}

#[tokio::test]
async fn test_send_link_uses_current_mode_without_probe() {
    let h = harness(FakeAgent::healthy());
    let controller = controller(&h, Arc::new(MemoryModeStore::new()));
    controller.set_mode(Mode::Disabled).await;

    controller
        .send_link("https://example.com/page.html")
        .await
        .unwrap();

    assert_eq!(h.agent.pings(), 0);
    assert_eq!(
        h.agent.submissions(),
        vec![("https://example.com/page.html".to_string(), Mode::Disabled)]
    );
    assert!(Mode::Disabled.autostart());
    assert_eq!(h.ui.notifications(), 0);
}

#[tokio::test]
async fn test_send_link_failure_notifies_and_marks_unavailable() {
    let h = harness(FakeAgent::down());
    let controller = controller(&h, Arc::new(MemoryModeStore::new()));

    let result = controller.send_link("https://example.com/page.html").await;

    assert!(matches!(result, Err(AgentError::HttpStatus { status: 500, .. })));
    assert_eq!(h.ui.notifications(), 1);
    assert!(h.engine.availability().is_in_cooldown());

    h.agent.accepts.store(true, Ordering::SeqCst);
    controller
        .send_link("https://example.com/page.html")
        .await
        .unwrap();
    assert!(!h.engine.availability().is_in_cooldown());
}

#[tokio::test]
async fn test_send_link_rejects_ineligible_url() {
    let h = harness(FakeAgent::healthy());
    let controller = controller(&h, Arc::new(MemoryModeStore::new()));

    let result = controller.send_link("about:blank").await;

    assert!(matches!(result, Err(AgentError::InvalidUrl { .. })));
    assert!(h.agent.submissions().is_empty());
    assert_eq!(h.ui.notifications(), 1);
}
