mod harness;

use harness::config::ConfigBuilder;
use harness::mock_ollama::MockOllama;
use harness::server::TestServer;
use serde_json::json;

const EQUATION: &str = "Löse das Gleichungssystem: x+y=10, x-y=2";

#[tokio::test]
async fn route_endpoint_does_not_call_backend() {
    let mock = MockOllama::start().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new(&mock.base_url()).build())
        .await
        .unwrap();

    let (status, body) = server
        .post("/v1/route", &json!({ "query": "Schreibe ein Bash-Skript zum automatischen Backup" }))
        .await;

    assert_eq!(status, 200);
    assert_eq!(body["decision"]["tier"], "code");
    assert_eq!(body["decision"]["reason"], "code_tech");
    assert_eq!(body["decision"]["model"], "qwen3-coder-30b-local");
    assert!(body["analysis"]["tech_score"].as_f64().unwrap() > 0.0);
    assert!(mock.generated().is_empty());
}

#[tokio::test]
async fn query_runs_on_analyzed_tier() {
    let mock = MockOllama::start().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new(&mock.base_url()).build())
        .await
        .unwrap();

    let (status, body) = server.post("/v1/query", &json!({ "query": EQUATION })).await;

    assert_eq!(status, 200);
    assert_eq!(body["tier"], "heavy");
    assert_eq!(body["model"], "llama3.1:70b");
    assert_eq!(body["response"], "reply from llama3.1:70b");
    assert!(body["failures"].as_array().unwrap().is_empty());
    assert_eq!(body["states"], json!(["executing", "succeeded"]));
    assert_eq!(mock.generated(), vec!["llama3.1:70b"]);
}

#[tokio::test]
async fn short_follow_up_keeps_session_tier() {
    let mock = MockOllama::start().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new(&mock.base_url()).build())
        .await
        .unwrap();

    let (_, first) = server.post("/v1/query", &json!({ "query": EQUATION })).await;
    let session_id = first["session_id"].as_str().unwrap().to_owned();

    let (status, second) = server
        .post("/v1/query", &json!({ "query": "Und warum?", "session_id": session_id }))
        .await;

    assert_eq!(status, 200);
    assert_eq!(second["tier"], "heavy");
    assert_eq!(second["decision"]["reason"], "session_follow_up");
    assert_eq!(second["session_id"], session_id.as_str());

    // Without the session the same question stays on the fast tier
    let (_, fresh) = server.post("/v1/query", &json!({ "query": "Und warum?" })).await;
    assert_eq!(fresh["tier"], "fast");
    assert_ne!(fresh["session_id"], session_id.as_str());

    let (status, session) = server.get(&format!("/v1/sessions/{session_id}")).await;
    assert_eq!(status, 200);
    assert_eq!(session["turns"], 2);
    assert_eq!(session["tier_usage"]["heavy"], 2);
    assert_eq!(session["history"][1]["query"], "Und warum?");
}

#[tokio::test]
async fn status_reports_loaded_tier() {
    let mock = MockOllama::start().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new(&mock.base_url()).build())
        .await
        .unwrap();

    server
        .post("/v1/query", &json!({ "query": "hallo", "tier": "code" }))
        .await;

    let (status, body) = server.get("/v1/status").await;

    assert_eq!(status, 200);
    assert_eq!(body["current_tier"], "code");
    assert_eq!(body["sessions"], 1);

    let tiers = body["tiers"].as_array().unwrap();
    let code = tiers.iter().find(|t| t["tier"] == "code").unwrap();
    assert_eq!(code["loaded"], true);
    assert_eq!(code["stats"]["requests"], 1);

    let heavy = tiers.iter().find(|t| t["tier"] == "heavy").unwrap();
    assert_eq!(heavy["loaded"], false);
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let mock = MockOllama::start().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new(&mock.base_url()).build())
        .await
        .unwrap();

    let (status, body) = server.get("/v1/sessions/does-not-exist").await;

    assert_eq!(status, 404);
    assert_eq!(body["error"]["type"], "session_not_found");
}
