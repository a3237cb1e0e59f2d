//! Chat turns and document intake for a case.
//!
//! Gateway failures never fail these operations. Each failure is logged once
//! and replaced with a fixed fallback value so the user-facing flow completes.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{CaseError, GatewayError};
use crate::legal::case::{Case, CaseStore, ChatMessage, Document, Sender};
use crate::legal::prompt::{DOCUMENT_EXTRACTION_PROMPT, PROBE_PROMPT, build_chat_prompt};
use crate::legal::redaction::redact_pii;
use crate::llm::AiGateway;

pub const CHAT_NOT_CONFIGURED: &str =
    "Error: The AI assistant is not configured. Please set the GOOGLE_API_KEY in your .env file.";
pub const CHAT_UNAVAILABLE: &str =
    "Sorry, I'm having trouble connecting to the AI service right now.";
pub const DOCUMENT_NOT_CONFIGURED: &str = "AI not configured.";
pub const MISSING_SUMMARY: &str = "No summary provided.";

pub fn unparsed_document_summary(filename: &str) -> String {
    format!("Could not automatically parse '{filename}'. Please review it manually.")
}

pub fn document_confirmation(filename: &str) -> String {
    format!(
        "Thank you. I have successfully processed the document: '{filename}'. You can now ask me questions about it."
    )
}

/// Summary and fields extracted from a document image.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentAnalysis {
    pub summary: String,
    pub extracted_data: Map<String, Value>,
}

impl DocumentAnalysis {
    fn not_configured() -> Self {
        Self {
            summary: DOCUMENT_NOT_CONFIGURED.to_string(),
            extracted_data: Map::new(),
        }
    }

    fn failed(filename: &str) -> Self {
        let mut extracted_data = Map::new();
        extracted_data.insert("error".to_string(), Value::from("AI parsing failed"));
        Self {
            summary: unparsed_document_summary(filename),
            extracted_data,
        }
    }
}

#[derive(Deserialize)]
struct RawAnalysis {
    summary: Option<String>,
    extracted_data: Option<Map<String, Value>>,
}

/// Parse the model's JSON answer, tolerating markdown code fences.
pub fn parse_document_analysis(raw: &str) -> Result<DocumentAnalysis, GatewayError> {
    let cleaned = raw.trim().replace("```json", "").replace("```", "");
    let parsed: RawAnalysis = serde_json::from_str(cleaned.trim())
        .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
    Ok(DocumentAnalysis {
        summary: parsed
            .summary
            .unwrap_or_else(|| MISSING_SUMMARY.to_string()),
        extracted_data: parsed.extracted_data.unwrap_or_default(),
    })
}

/// Lowercased `type/subtype` of a declared image content type, with any
/// parameters dropped. `None` for anything that is not an image.
pub fn image_mime_type(content_type: Option<&str>) -> Option<String> {
    let essence = content_type?
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence.starts_with("image/").then_some(essence)
}

/// True when a declared content type names an image.
pub fn is_image_content_type(content_type: Option<&str>) -> bool {
    image_mime_type(content_type).is_some()
}

/// Case operations that involve the AI gateway.
pub struct CaseAssistant {
    store: Arc<CaseStore>,
    gateway: Option<Arc<dyn AiGateway>>,
}

impl CaseAssistant {
    pub fn new(store: Arc<CaseStore>, gateway: Option<Arc<dyn AiGateway>>) -> Self {
        Self { store, gateway }
    }

    pub fn store(&self) -> &CaseStore {
        &self.store
    }

    pub fn is_configured(&self) -> bool {
        self.gateway.is_some()
    }

    /// Run one chat turn and return the agent's reply.
    ///
    /// The user message is stored before the gateway is called, so a failure
    /// mid-call leaves an unanswered question rather than a lost one.
    pub async fn chat_turn(&self, case_id: u64, message: &str) -> Result<ChatMessage, CaseError> {
        if !self.store.contains(case_id).await {
            return Err(CaseError::NotFound(case_id));
        }
        if message.is_empty() {
            return Err(CaseError::Validation(
                "Message content is required.".to_string(),
            ));
        }

        self.store
            .append_message(case_id, Sender::User, message)
            .await?;
        let case = self.store.get_case(case_id).await?;
        let prompt = build_chat_prompt(&case, &redact_pii(message));

        let reply = self.chat_reply(&case, &prompt).await;
        self.store
            .append_message(case_id, Sender::Agent, reply)
            .await
    }

    async fn chat_reply(&self, case: &Case, prompt: &str) -> String {
        let Some(gateway) = self.gateway.as_ref() else {
            tracing::warn!(case_id = case.id, "AI gateway not configured; using fallback reply");
            return CHAT_NOT_CONFIGURED.to_string();
        };

        tracing::debug!(case_id = case.id, model = gateway.model_name(), %prompt, "Sending chat prompt");
        match gateway.complete(prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(case_id = case.id, error = %e, "Chat completion failed");
                CHAT_UNAVAILABLE.to_string()
            }
        }
    }

    /// Analyze an uploaded image, store it on the case and confirm in chat.
    pub async fn upload_document(
        &self,
        case_id: u64,
        filename: &str,
        content_type: Option<&str>,
        payload: &[u8],
    ) -> Result<Document, CaseError> {
        if !self.store.contains(case_id).await {
            return Err(CaseError::NotFound(case_id));
        }
        let Some(mime_type) = image_mime_type(content_type) else {
            return Err(CaseError::Validation(
                "File must be an image (e.g., PNG, JPG) for Vision API processing.".to_string(),
            ));
        };
        let analysis = self.analyze(case_id, filename, &mime_type, payload).await;

        let document = self
            .store
            .append_document(case_id, filename, analysis.summary, analysis.extracted_data)
            .await?;
        self.store
            .append_message(case_id, Sender::Agent, document_confirmation(filename))
            .await?;

        tracing::info!(case_id, document_id = document.id, bytes = payload.len(), "Stored document");
        Ok(document)
    }

    async fn analyze(
        &self,
        case_id: u64,
        filename: &str,
        mime_type: &str,
        payload: &[u8],
    ) -> DocumentAnalysis {
        let Some(gateway) = self.gateway.as_ref() else {
            tracing::warn!(case_id, "AI gateway not configured; skipping document analysis");
            return DocumentAnalysis::not_configured();
        };

        let result = gateway
            .complete_with_image(DOCUMENT_EXTRACTION_PROMPT, payload, mime_type)
            .await
            .and_then(|raw| parse_document_analysis(&raw));
        match result {
            Ok(analysis) => analysis,
            Err(e) => {
                tracing::warn!(case_id, filename, error = %e, "Document analysis failed");
                DocumentAnalysis::failed(filename)
            }
        }
    }

    /// Send a fixed prompt to check that the gateway answers.
    pub async fn probe(&self) -> Result<String, GatewayError> {
        let gateway = self.gateway.as_ref().ok_or(GatewayError::NotConfigured)?;
        let text = gateway.complete(PROBE_PROMPT).await?;
        if text.trim().is_empty() {
            return Err(GatewayError::EmptyResponse);
        }
        Ok(text)
    }
}
