//! End-to-end pipeline scenarios against the in-memory reference
//! fixture, rules-only unless a scripted model is plugged in.

use std::sync::Arc;

use chrono::{Datelike, Duration, Local, Weekday};

use airops_nlu::llm::LanguageModel;
use airops_nlu::testutils::{heathrow_fixture, ScriptedLlm};
use airops_nlu::{
    Context, EntityValue, NluConfig, NluPipeline, OperationKind, PipelineResponse,
};

fn pipeline() -> NluPipeline {
    NluPipeline::new(None, Some(Arc::new(heathrow_fixture())), NluConfig::default())
}

fn today_iso() -> String {
    Local::now().date_naive().format("%Y-%m-%d").to_string()
}

fn tomorrow_iso() -> String {
    (Local::now().date_naive() + Duration::days(1))
        .format("%Y-%m-%d")
        .to_string()
}

fn next_friday_iso() -> String {
    let mut date = Local::now().date_naive() + Duration::days(1);
    while date.weekday() != Weekday::Fri {
        date += Duration::days(1);
    }
    date.format("%Y-%m-%d").to_string()
}

#[tokio::test]
async fn stand_details_with_inference_and_defaults() {
    let out = pipeline()
        .process("Tell me about stand A1", &Context::default())
        .await;
    assert!(out.success);

    let PipelineResponse::Query { domain, .. } = out.data.unwrap() else {
        panic!("expected a query response");
    };
    assert_eq!(domain.intent, "stand.details");
    assert_eq!(domain.entities["stand"], EntityValue::Text("A1".into()));
    assert_eq!(domain.entities["airport"], EntityValue::Text("LHR".into()));
    assert_eq!(domain.entities["terminal"], EntityValue::Text("T1".into()));
    assert_eq!(domain.entities["pier"], EntityValue::Text("A".into()));
    assert_eq!(domain.entities["date"], EntityValue::Text(today_iso()));
    assert_eq!(
        domain.entities["_airportFromDefault"],
        EntityValue::Bool(true)
    );

    assert_eq!(out.metadata.extra["category"], serde_json::json!("asset"));
    assert_eq!(out.metadata.extra["locationBased"], serde_json::json!(true));
}

#[tokio::test]
async fn aircraft_fit_question_with_relative_date() {
    let out = pipeline()
        .process(
            "Can a Boeing 777 use stand A1 at Terminal 1 tomorrow?",
            &Context::default(),
        )
        .await;
    assert!(out.success);

    let PipelineResponse::Query { domain, .. } = out.data.unwrap() else {
        panic!("expected a query response");
    };
    assert_eq!(domain.intent, "aircraft.stands");
    assert_eq!(
        domain.entities["aircraftType"],
        EntityValue::Text("777".into())
    );
    assert_eq!(domain.entities["stand"], EntityValue::Text("A1".into()));
    assert_eq!(domain.entities["terminal"], EntityValue::Text("T1".into()));
    assert_eq!(domain.entities["date"], EntityValue::Text(tomorrow_iso()));
    // Aircraft size arrives via one-hop inference.
    assert_eq!(
        domain.entities["aircraftSize"],
        EntityValue::Text("E".into())
    );
    assert_eq!(out.metadata.extra["timeDependent"], serde_json::json!(true));
}

#[tokio::test]
async fn delete_stand_confirmation_is_exact() {
    let out = pipeline().process("Delete stand A1", &Context::default()).await;
    assert!(out.success);

    let PipelineResponse::Operation { operation, .. } = out.data.unwrap() else {
        panic!("expected an operation response");
    };
    assert_eq!(operation.operation_type, OperationKind::Delete);
    assert_eq!(operation.entity_type, "stand");
    assert_eq!(operation.parameters["id"], serde_json::json!("A1"));
    assert!(operation.requires_confirmation);
    assert_eq!(
        operation.confirmation_message.as_deref(),
        Some("Delete stand \"A1\"?")
    );
    assert_eq!(out.metadata.extra["state"], serde_json::json!("confirming"));
}

#[tokio::test]
async fn schedule_maintenance_full_parameters() {
    let out = pipeline()
        .process(
            "Schedule maintenance for stand A1 from tomorrow until next Friday \
             due to surface repairs with high priority",
            &Context::default(),
        )
        .await;
    assert!(out.success);

    let PipelineResponse::Operation { operation, .. } = out.data.unwrap() else {
        panic!("expected an operation response");
    };
    assert_eq!(operation.operation_type, OperationKind::Create);
    assert_eq!(operation.entity_type, "maintenance");
    assert_eq!(operation.parameters["standId"], serde_json::json!("A1"));
    assert_eq!(
        operation.parameters["startDate"],
        serde_json::json!(tomorrow_iso())
    );
    assert_eq!(
        operation.parameters["endDate"],
        serde_json::json!(next_friday_iso())
    );
    assert_eq!(
        operation.parameters["reason"],
        serde_json::json!("surface repairs")
    );
    assert_eq!(operation.parameters["priority"], serde_json::json!("high"));
    assert!(operation.parameter_status.is_complete);
}

#[tokio::test]
async fn update_without_identifier_is_incomplete() {
    let out = pipeline()
        .process("Update the stand with type=remote", &Context::default())
        .await;
    assert!(out.success);

    let PipelineResponse::Operation { operation, .. } = out.data.unwrap() else {
        panic!("expected an operation response");
    };
    assert_eq!(operation.operation_type, OperationKind::Update);
    assert_eq!(operation.entity_type, "stand");
    let fields = operation.fields_to_update.unwrap();
    assert_eq!(fields["type"], serde_json::json!("remote"));
    assert!(!operation.parameter_status.is_complete);
    assert!(operation
        .parameter_status
        .missing_params
        .contains(&"id".to_string()));
    assert_eq!(out.metadata.extra["state"], serde_json::json!("validated"));
}

#[tokio::test]
async fn unclear_input_is_gated_before_extraction() {
    let llm = Arc::new(ScriptedLlm::always(
        r#"{"intent": "unknown", "confidence": 0.3}"#,
    ));
    let p = NluPipeline::new(
        Some(llm.clone() as Arc<dyn LanguageModel>),
        Some(Arc::new(heathrow_fixture())),
        NluConfig::default(),
    );

    let out = p
        .process("something very unclear", &Context::default())
        .await;
    assert!(!out.success);
    assert_eq!(out.error_code(), Some("LOW_CONFIDENCE"));
    // One call for classification; the extractor never ran.
    assert_eq!(llm.calls(), 1);
}

// ── caching ──────────────────────────────────────────────────────────

#[tokio::test]
async fn repeat_queries_are_cached_and_equal() {
    let p = pipeline();
    let context = Context::for_conversation("conv-1");

    let first = p.process("Tell me about stand A1", &context).await;
    assert_eq!(first.metadata.extra["cached"], serde_json::json!(false));
    assert_eq!(
        first.metadata.extra["intentSource"],
        serde_json::json!("rules")
    );

    let second = p.process("tell me about stand A1", &context).await;
    assert_eq!(second.metadata.extra["cached"], serde_json::json!(true));

    let (a, b) = match (first.data.unwrap(), second.data.unwrap()) {
        (
            PipelineResponse::Query { parsed: a, .. },
            PipelineResponse::Query { parsed: b, .. },
        ) => (a, b),
        _ => panic!("expected query responses"),
    };
    assert_eq!(a.intent, b.intent);
    assert_eq!(a.entities, b.entities);
}

#[tokio::test]
async fn cache_evicts_oldest_insertion() {
    let config = NluConfig {
        cache_size: 2,
        ..NluConfig::default()
    };
    let p = NluPipeline::new(None, Some(Arc::new(heathrow_fixture())), config);
    let context = Context::default();

    p.process("Tell me about stand A1", &context).await;
    p.process("Tell me about stand B2", &context).await;
    p.process("Which stands are in Terminal 1?", &context).await;

    // The oldest entry fell out; the newer two are still served.
    let evicted = p.process("Tell me about stand A1", &context).await;
    assert_eq!(evicted.metadata.extra["cached"], serde_json::json!(false));
    let kept = p.process("Tell me about stand B2", &context).await;
    assert_eq!(kept.metadata.extra["cached"], serde_json::json!(true));
}

// ── metrics ──────────────────────────────────────────────────────────

#[tokio::test]
async fn processed_equals_succeeded_plus_failed() {
    let p = pipeline();
    p.process("Tell me about stand A1", &Context::default()).await;
    p.process("", &Context::default()).await;
    p.process("something very unclear", &Context::default()).await;

    let metrics = p.metrics();
    assert_eq!(
        metrics.parser.processed,
        metrics.parser.succeeded + metrics.parser.failed
    );
    assert_eq!(metrics.parser.processed, 3);
    assert_eq!(metrics.parser.failed, 2);
}

// ── confirmation necessity ───────────────────────────────────────────

#[tokio::test]
async fn only_mutating_operations_require_confirmation() {
    let p = pipeline();

    for (text, mutating) in [
        ("Delete stand A1", true),
        ("Create a stand called \"North Remote 1\" in terminal 2", true),
        ("Update stand A1 status: active", true),
        ("List stands", false),
    ] {
        let out = p.process(text, &Context::default()).await;
        let PipelineResponse::Operation { operation, .. } = out.data.unwrap() else {
            panic!("expected an operation response for {:?}", text);
        };
        assert_eq!(
            operation.requires_confirmation, mutating,
            "confirmation mismatch for {:?}",
            text
        );
    }
}
