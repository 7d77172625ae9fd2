// engine scenarios driven through the library API

use crate::common::CHECKOUT_FORM;

use std::sync::Arc;
use std::time::Duration;

use fieldlogic::config::{EngineConfig, ErrorPolicy};
use fieldlogic::engine::{ChannelPublisher, Engine, InlineScheduler, Publication, RecordingPublisher};
use fieldlogic::form::{FormDocument, MemoryHost};
use fieldlogic::logic::Value;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

fn config() -> EngineConfig {
    EngineConfig {
        error_policy: ErrorPolicy::RuleFalse,
        ..EngineConfig::default()
    }
}

fn checkout() -> (FormDocument, Arc<MemoryHost>) {
    let form = FormDocument::parse(CHECKOUT_FORM).unwrap();
    let host = Arc::new(MemoryHost::from_document(&form));
    (form, host)
}

fn register_all(engine: &Engine, form: &FormDocument) {
    for container in &form.containers {
        for (id, outcome) in engine
            .register_container(&container.id, container.field_ids())
            .unwrap()
        {
            outcome.unwrap_or_else(|e| panic!("setup of {} failed: {}", id, e));
        }
    }
}

/// collect publications until the channel stays quiet
async fn collect(rx: &mut UnboundedReceiver<Publication>) -> Vec<Publication> {
    let mut out = Vec::new();
    while let Ok(Some(publication)) = timeout(Duration::from_millis(150), rx.recv()).await {
        out.push(publication);
    }
    out
}

fn visibility_of(publications: &[Publication], field_id: &str) -> Vec<bool> {
    publications
        .iter()
        .filter_map(|p| match p {
            Publication::Visibility { field_id: id, state, .. } if id == field_id => {
                Some(state.is_visible)
            }
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_setup_hidden_then_update_visible() {
    let (form, host) = checkout();
    let (publisher, mut rx) = ChannelPublisher::new();
    let engine = Engine::new(host.clone(), Arc::new(publisher), config());
    register_all(&engine, &form);

    let initial = collect(&mut rx).await;
    assert_eq!(visibility_of(&initial, "shipping.address"), vec![false]);
    assert_eq!(visibility_of(&initial, "billing.invoice"), vec![false]);

    host.set_value("shipping.method", Value::from("delivery"));
    engine
        .field_updated("shipping.method", Some(Value::from("delivery")))
        .unwrap();

    let updates = collect(&mut rx).await;
    assert_eq!(visibility_of(&updates, "shipping.address"), vec![true]);
    assert!(visibility_of(&updates, "billing.invoice").is_empty());

    engine.shutdown().await;
}

#[tokio::test]
async fn test_update_from_other_container_is_ignored() {
    let (form, host) = checkout();
    let (publisher, mut rx) = ChannelPublisher::new();
    let engine = Engine::new(host.clone(), Arc::new(publisher), config());
    register_all(&engine, &form);
    collect(&mut rx).await;

    // both containers have a "method" field; only billing's listener hears this
    host.set_value("billing.method", Value::from("delivery"));
    let delivered = engine
        .field_updated("billing.method", Some(Value::from("delivery")))
        .unwrap();
    assert_eq!(delivered, 1);

    let updates = collect(&mut rx).await;
    assert!(visibility_of(&updates, "shipping.address").is_empty());
    assert_eq!(visibility_of(&updates, "billing.invoice"), vec![false]);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_unset_update_publishes_nothing() {
    let (form, host) = checkout();
    let (publisher, mut rx) = ChannelPublisher::new();
    let engine = Engine::new(host, Arc::new(publisher), config());
    register_all(&engine, &form);
    collect(&mut rx).await;

    engine.field_updated("shipping.method", None).unwrap();
    assert!(collect(&mut rx).await.is_empty());

    engine.shutdown().await;
}

#[tokio::test]
async fn test_teardown_container_leaves_other_running() {
    let (form, host) = checkout();
    let (publisher, mut rx) = ChannelPublisher::new();
    let engine = Engine::new(host.clone(), Arc::new(publisher), config());
    register_all(&engine, &form);
    collect(&mut rx).await;

    assert_eq!(engine.teardown_container("shipping"), 1);
    assert_eq!(engine.active_listeners(), vec!["billing.invoice".to_string()]);

    host.set_value("shipping.method", Value::from("delivery"));
    assert_eq!(
        engine
            .field_updated("shipping.method", Some(Value::from("delivery")))
            .unwrap(),
        0
    );
    host.set_value("billing.total", Value::from(500));
    engine
        .field_updated("billing.total", Some(Value::from(500)))
        .unwrap();

    let updates = collect(&mut rx).await;
    assert!(visibility_of(&updates, "shipping.address").is_empty());
    assert_eq!(visibility_of(&updates, "billing.invoice"), vec![true]);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_fail_policy_reports_diagnostic_then_fallback() {
    let form = FormDocument::parse(
        r#"{ containers: [{ id: "c", fields: [
            { name: "a", value: "x" },
            { name: "b", conditional_logic: [{ field: "gone", value: "x" }] },
        ] }] }"#,
    )
    .unwrap();
    let host = Arc::new(MemoryHost::from_document(&form));
    let (publisher, mut rx) = ChannelPublisher::new();
    let config = EngineConfig {
        error_policy: ErrorPolicy::Fail,
        fallback_visibility: false,
        ..EngineConfig::default()
    };
    let engine = Engine::new(host, Arc::new(publisher), config);
    register_all(&engine, &form);

    let publications = collect(&mut rx).await;
    assert_eq!(publications.len(), 2);
    match &publications[0] {
        Publication::Diagnostic(diagnostic) => {
            assert_eq!(diagnostic.field_id, "c.b");
            assert_eq!(diagnostic.errors.len(), 1);
            assert_eq!(diagnostic.fallback.map(|s| s.is_visible), Some(false));
        }
        other => panic!("expected a diagnostic first, got {:?}", other),
    }
    assert_eq!(visibility_of(&publications, "c.b"), vec![false]);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_unchanged_state_not_republished_when_disabled() {
    let (form, host) = checkout();
    let (publisher, mut rx) = ChannelPublisher::new();
    let config = EngineConfig {
        publish_unchanged: false,
        ..config()
    };
    let engine = Engine::new(host.clone(), Arc::new(publisher), config);
    register_all(&engine, &form);
    collect(&mut rx).await;

    // still hidden: nothing to publish
    host.set_value("shipping.method", Value::from("courier"));
    engine
        .field_updated("shipping.method", Some(Value::from("courier")))
        .unwrap();
    assert!(collect(&mut rx).await.is_empty());

    host.set_value("shipping.method", Value::from("delivery"));
    engine
        .field_updated("shipping.method", Some(Value::from("delivery")))
        .unwrap();
    assert_eq!(visibility_of(&collect(&mut rx).await, "shipping.address"), vec![true]);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_async_engine_agrees_with_inline_scheduler() {
    let updates: Vec<(&str, Value)> = vec![
        ("billing.method", Value::from("invoice")),
        ("billing.total", Value::from(20)),
        ("shipping.method", Value::from("delivery")),
        ("billing.method", Value::from("card")),
        ("billing.total", Value::from("120")),
    ];

    let (form, inline_host) = checkout();
    let recorder = Arc::new(RecordingPublisher::new());
    let mut scheduler = InlineScheduler::new(inline_host.clone(), recorder.clone(), config());
    for container in &form.containers {
        scheduler.register_container(&container.id, container.field_ids());
    }
    for (id, value) in &updates {
        inline_host.set_value(id, value.clone());
        scheduler.field_updated(id, Some(value.clone())).unwrap();
    }

    let (form, host) = checkout();
    let (publisher, mut rx) = ChannelPublisher::new();
    let engine = Engine::new(host.clone(), Arc::new(publisher), config());
    register_all(&engine, &form);
    for (id, value) in &updates {
        host.set_value(id, value.clone());
        engine.field_updated(id, Some(value.clone())).unwrap();
        // let listeners settle so each evaluation sees one update at a time
        collect(&mut rx).await;
    }
    engine.drain().await;

    let recorded = recorder.states();
    for id in ["shipping.address", "billing.invoice"] {
        let (publisher, mut replay) = ChannelPublisher::new();
        let check = Engine::new(host.clone(), Arc::new(publisher), config());
        check.setup_field(id).unwrap();
        let final_state = visibility_of(&collect(&mut replay).await, id);
        assert_eq!(
            final_state.last().copied(),
            recorded.get(id).map(|s| s.is_visible),
            "field {}",
            id
        );
        check.shutdown().await;
    }
    assert!(recorded["shipping.address"].is_visible);
    assert!(recorded["billing.invoice"].is_visible);
}
