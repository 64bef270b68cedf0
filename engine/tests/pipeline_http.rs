//! End-to-end tests for the simulation pipeline over HTTP.
//!
//! These exercise the full path: submit → prompt → Gemini request → envelope →
//! answer extraction → reply decoding → status.

use serde_json::{Value, json};
use std::time::Duration;
use thoughtcomm_engine::{
    FailureReason, PipelineStatus, SimulationPipeline, SimulationResult, SubmitRejection,
    ThoughtcommConfig,
};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GENERATE_PATH: &str = "/models/gemini-test:generateContent";

fn config_for(server: &MockServer, timeout_seconds: u64) -> ThoughtcommConfig {
    let toml_str = format!(
        r#"
[service]
endpoint = "{uri}"
model = "gemini-test"
timeout_seconds = {timeout_seconds}
allow_http = true

[api_keys]
google = "AIza-integration"
"#,
        uri = server.uri()
    );
    toml::from_str(&toml_str).unwrap()
}

fn envelope(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    })
}

#[tokio::test]
async fn fenced_consensus_round_trip() {
    let server = MockServer::start().await;
    let answer = "```json\n{\"agentA\":\"Measure first.\",\"agentB\":\"Try it live.\",\"sharedThought\":\"Both want evidence.\",\"consensus\":\"Run a small pilot.\"}\n```";
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header("x-goog-api-key", "AIza-integration"))
        .and(body_string_contains("Should we adopt the new protocol?"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(answer)))
        .expect(1)
        .mount(&server)
        .await;

    let pipeline = SimulationPipeline::from_config(&config_for(&server, 5)).unwrap();
    pipeline
        .submit("Should we adopt the new protocol?")
        .unwrap()
        .finished()
        .await;

    let PipelineStatus::Succeeded(SimulationResult::Consensus(consensus)) = pipeline.status()
    else {
        panic!("expected consensus, got {:?}", pipeline.status());
    };
    assert_eq!(consensus.agent_a_statement(), "Measure first.");
    assert_eq!(consensus.agent_b_statement(), "Try it live.");
    assert_eq!(consensus.shared_thought(), "Both want evidence.");
    assert_eq!(consensus.final_answer(), "Run a small pilot.");
}

#[tokio::test]
async fn prose_answer_degrades() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope("No JSON today.")))
        .mount(&server)
        .await;

    let pipeline = SimulationPipeline::from_config(&config_for(&server, 5)).unwrap();
    pipeline.submit("q").unwrap().finished().await;

    assert_eq!(
        pipeline.status(),
        PipelineStatus::Succeeded(SimulationResult::Degraded {
            raw_text: "No JSON today.".to_string()
        })
    );
}

#[tokio::test]
async fn server_error_is_service_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .expect(1)
        .mount(&server)
        .await;

    let pipeline = SimulationPipeline::from_config(&config_for(&server, 5)).unwrap();
    pipeline.submit("q").unwrap().finished().await;

    assert_eq!(
        pipeline.status(),
        PipelineStatus::Failed(FailureReason::ServiceError(500))
    );
}

#[tokio::test]
async fn envelope_without_candidates_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "promptFeedback": { "blockReason": "SAFETY" } })),
        )
        .mount(&server)
        .await;

    let pipeline = SimulationPipeline::from_config(&config_for(&server, 5)).unwrap();
    pipeline.submit("q").unwrap().finished().await;

    assert_eq!(
        pipeline.status(),
        PipelineStatus::Failed(FailureReason::MalformedEnvelope)
    );
}

#[tokio::test]
async fn unreachable_service_is_network_error() {
    let server = MockServer::start().await;
    let config = config_for(&server, 2);
    drop(server);

    let pipeline = SimulationPipeline::from_config(&config).unwrap();
    pipeline.submit("q").unwrap().finished().await;

    assert_eq!(
        pipeline.status(),
        PipelineStatus::Failed(FailureReason::NetworkError)
    );
    assert!(!pipeline.is_pending());
}

#[tokio::test]
async fn slow_service_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope("late"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let pipeline = SimulationPipeline::from_config(&config_for(&server, 1)).unwrap();
    pipeline.submit("q").unwrap().finished().await;

    assert_eq!(
        pipeline.status(),
        PipelineStatus::Failed(FailureReason::NetworkError)
    );
}

#[tokio::test]
async fn busy_panel_sends_one_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope("done"))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let pipeline = SimulationPipeline::from_config(&config_for(&server, 5)).unwrap();
    let first = pipeline.submit("first").unwrap();
    for _ in 0..3 {
        assert_eq!(pipeline.submit("again").unwrap_err(), SubmitRejection::Busy);
    }
    first.finished().await;

    assert!(pipeline.status().is_resolved());
    server.verify().await;
}
