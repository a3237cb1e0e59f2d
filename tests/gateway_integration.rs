//! End-to-end integration tests for the case gateway.
//!
//! These tests start a real Axum server on a random port with a scripted AI
//! gateway and drive the HTTP API with reqwest:
//! - case listing and creation
//! - chat turns, including gateway failure fallbacks
//! - document uploads (JSON extraction, non-image rejection, failure fallback)
//! - upload body limits
//! - the gateway probe endpoint
//! - graceful shutdown

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use caseaid::channels::web::server::{GatewayState, start_server};
use caseaid::error::GatewayError;
use caseaid::legal::assistant::CaseAssistant;
use caseaid::legal::case::CaseStore;
use caseaid::llm::AiGateway;

/// What the scripted gateway answers with.
#[derive(Clone)]
enum Script {
    Reply(String),
    Fail,
}

struct ScriptedGateway {
    script: Script,
    calls: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn answer(&self, prompt: &str) -> Result<String, GatewayError> {
        self.calls.lock().unwrap().push(prompt.to_string());
        match &self.script {
            Script::Reply(text) => Ok(text.clone()),
            Script::Fail => Err(GatewayError::Api {
                status: 503,
                message: "UNAVAILABLE: model overloaded".to_string(),
            }),
        }
    }
}

#[async_trait]
impl AiGateway for ScriptedGateway {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str) -> Result<String, GatewayError> {
        self.answer(prompt)
    }

    async fn complete_with_image(
        &self,
        prompt: &str,
        _image: &[u8],
        mime_type: &str,
    ) -> Result<String, GatewayError> {
        assert!(mime_type.starts_with("image/"));
        self.answer(prompt)
    }
}

struct TestServer {
    addr: SocketAddr,
    state: Arc<GatewayState>,
    client: reqwest::Client,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn cases(&self) -> Vec<Value> {
        self.client
            .get(self.url("/api/cases"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    async fn case(&self, id: u64) -> Value {
        self.cases()
            .await
            .into_iter()
            .find(|c| c["id"] == id)
            .expect("case should exist")
    }

    async fn chat(&self, id: u64, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/api/cases/{id}/chat")))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn upload(&self, id: u64, filename: &str, mime: &str, bytes: &[u8]) -> reqwest::Response {
        let part = Part::bytes(bytes.to_vec())
            .file_name(filename.to_string())
            .mime_str(mime)
            .unwrap();
        self.client
            .post(self.url(&format!("/api/cases/{id}/documents")))
            .multipart(Form::new().part("file", part))
            .send()
            .await
            .unwrap()
    }
}

async fn start_test_server(gateway: Option<Arc<ScriptedGateway>>) -> TestServer {
    let assistant = CaseAssistant::new(
        Arc::new(CaseStore::with_demo_case()),
        gateway.map(|g| g as Arc<dyn AiGateway>),
    );
    let state = Arc::new(GatewayState::new(assistant));

    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let bound_addr = start_server(addr, state.clone(), &[])
        .await
        .expect("Failed to start test server");

    TestServer {
        addr: bound_addr,
        state,
        client: reqwest::Client::new(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_list_cases_returns_demo_case() {
    let server = start_test_server(None).await;

    let cases = server.cases().await;
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0]["name"], "Parking Ticket on Elm St.");
    assert_eq!(cases[0]["documents"][0]["id"], 101);
    assert_eq!(cases[0]["documents"][0]["extracted_data"]["due_date"], "2025-07-15");
    assert_eq!(cases[0]["chat_history"][0]["sender"], "agent");

    server.state.shutdown().await;
}

#[tokio::test]
async fn test_create_case_assigns_next_id() {
    let server = start_test_server(None).await;

    let resp = server
        .client
        .post(server.url("/api/cases"))
        .json(&serde_json::json!({"name": "Eviction notice"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = resp.json().await.unwrap();
    assert_eq!(created["id"], 2);
    assert_eq!(
        created["chat_history"][0]["content"],
        "Hello! I've created your case 'Eviction notice'. How can I assist you?"
    );

    let resp = server
        .client
        .post(server.url("/api/cases"))
        .json(&serde_json::json!({"name": ""}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(server.cases().await.len(), 2);

    let resp = server
        .client
        .post(server.url("/api/cases"))
        .json(&serde_json::json!({"name": "  Unpaid wages "}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = resp.json().await.unwrap();
    assert_eq!(created["id"], 3);
    assert_eq!(created["name"], "  Unpaid wages ");
}

#[tokio::test]
async fn test_chat_turn_appends_user_then_agent() {
    let gateway = ScriptedGateway::new(Script::Reply("You may request a hearing.".to_string()));
    let server = start_test_server(Some(gateway.clone())).await;

    let resp = server
        .chat(1, serde_json::json!({"message": "My number is 555-123-4567. Can I contest?"}))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let reply: Value = resp.json().await.unwrap();
    assert_eq!(reply["id"], 3);
    assert_eq!(reply["sender"], "agent");
    assert_eq!(reply["content"], "You may request a hearing.");

    let history = server.case(1).await["chat_history"].clone();
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[1]["sender"], "user");
    assert_eq!(history[1]["content"], "My number is 555-123-4567. Can I contest?");

    let calls = gateway.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].contains("Document 'parking_ticket.pdf'"));
    assert!(calls[0].contains("User: My number is [REDACTED_PHONE]. Can I contest?"));
    assert!(!calls[0].contains("555-123-4567"));
}

#[tokio::test]
async fn test_chat_turn_survives_gateway_failure() {
    let server = start_test_server(Some(ScriptedGateway::new(Script::Fail))).await;

    let resp = server.chat(1, serde_json::json!({"message": "Hello?"})).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let reply: Value = resp.json().await.unwrap();
    assert_eq!(
        reply["content"],
        "Sorry, I'm having trouble connecting to the AI service right now."
    );

    let history = server.case(1).await["chat_history"].clone();
    let senders: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["sender"].as_str().unwrap())
        .collect();
    assert_eq!(senders, vec!["agent", "user", "agent"]);
}

#[tokio::test]
async fn test_chat_on_unknown_case_is_not_found() {
    let gateway = ScriptedGateway::new(Script::Reply("unused".to_string()));
    let server = start_test_server(Some(gateway.clone())).await;

    let resp = server.chat(99, serde_json::json!({"message": "Hi"})).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = server.chat(1, serde_json::json!({})).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    assert_eq!(server.case(1).await["chat_history"].as_array().unwrap().len(), 1);
    assert!(gateway.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_stores_extracted_document() {
    let gateway = ScriptedGateway::new(Script::Reply(
        "```json\n{\"summary\": \"A court notice for a hearing.\", \"extracted_data\": {\"case_number\": \"CV-12345\", \"fine_amount\": 250}}\n```"
            .to_string(),
    ));
    let server = start_test_server(Some(gateway)).await;

    let resp = server
        .upload(1, "notice.png", "image/png", b"\x89PNG\r\n\x1a\n")
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let doc: Value = resp.json().await.unwrap();
    assert_eq!(doc["id"], 102);
    assert_eq!(doc["name"], "notice.png");
    assert_eq!(doc["summary"], "A court notice for a hearing.");
    assert_eq!(doc["extracted_data"]["fine_amount"], 250);

    let case = server.case(1).await;
    assert_eq!(case["documents"].as_array().unwrap().len(), 2);
    let history = case["chat_history"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(
        history[1]["content"],
        "Thank you. I have successfully processed the document: 'notice.png'. You can now ask me questions about it."
    );
}

#[tokio::test]
async fn test_upload_rejects_non_image() {
    let server = start_test_server(Some(ScriptedGateway::new(Script::Reply("{}".to_string())))).await;

    let resp = server.upload(1, "notes.txt", "text/plain", b"hello").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let case = server.case(1).await;
    assert_eq!(case["documents"].as_array().unwrap().len(), 1);
    assert_eq!(case["chat_history"].as_array().unwrap().len(), 1);

    let resp = server.upload(42, "scan.png", "image/png", b"png").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_falls_back_when_gateway_fails() {
    let server = start_test_server(Some(ScriptedGateway::new(Script::Fail))).await;

    let resp = server.upload(1, "ticket.jpg", "image/jpeg", b"jpeg").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let doc: Value = resp.json().await.unwrap();
    assert!(doc["summary"].as_str().unwrap().contains("ticket.jpg"));
    assert_eq!(doc["extracted_data"]["error"], "AI parsing failed");

    let history = server.case(1).await["chat_history"].clone();
    assert_eq!(history.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_upload_body_limit_is_ten_mib() {
    let server = start_test_server(Some(ScriptedGateway::new(Script::Reply(
        r#"{"summary": "A large scan."}"#.to_string(),
    ))))
    .await;

    // Above the 1 MiB default for other routes, below the upload limit.
    let resp = server
        .upload(1, "scan.png", "image/png", &vec![0u8; 2 * 1024 * 1024])
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = server
        .upload(1, "huge.png", "image/png", &vec![0u8; 11 * 1024 * 1024])
        .await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let case = server.case(1).await;
    assert_eq!(case["documents"].as_array().unwrap().len(), 2);
    assert_eq!(case["chat_history"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_probe_endpoint() {
    let server = start_test_server(Some(ScriptedGateway::new(Script::Reply(
        "Hello, World!".to_string(),
    ))))
    .await;
    let body: Value = server
        .client
        .get(server.url("/api/test-gemini"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["response"], "Hello, World!");

    let failing = start_test_server(Some(ScriptedGateway::new(Script::Fail))).await;
    let resp = failing
        .client
        .get(failing.url("/api/test-gemini"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(resp.text().await.unwrap().contains("Failed to connect to Gemini API"));
}

#[tokio::test]
async fn test_health_reports_gateway_configuration() {
    let server = start_test_server(None).await;
    let body: Value = server
        .client
        .get(server.url("/api/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["ai_configured"], false);
}

#[tokio::test]
async fn test_shutdown_waits_for_server_to_stop() {
    let server = start_test_server(None).await;
    assert_eq!(server.cases().await.len(), 1);

    server.state.shutdown().await;

    let result = reqwest::Client::new()
        .get(server.url("/api/health"))
        .send()
        .await;
    assert!(result.is_err(), "server should no longer accept connections");
}
