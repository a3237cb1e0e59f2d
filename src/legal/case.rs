//! In-memory case store.
//!
//! Cases own their chat history and documents. Both sequences are append-only
//! and their ids are derived from the current length, so creation order
//! determines id order.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::error::CaseError;

/// Document ids start above this base so they never collide with message ids.
pub const DOCUMENT_ID_BASE: u64 = 100;

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Agent,
}

impl Sender {
    /// Capitalized label used when rendering history into a prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Agent => "Agent",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub sender: Sender,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: u64,
    pub name: String,
    pub upload_date: DateTime<Utc>,
    pub summary: String,
    pub extracted_data: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub id: u64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub documents: Vec<Document>,
    pub chat_history: Vec<ChatMessage>,
}

impl Case {
    fn new(id: u64, name: String) -> Self {
        Self {
            id,
            name,
            created_at: Utc::now(),
            documents: Vec::new(),
            chat_history: Vec::new(),
        }
    }

    fn push_message(&mut self, sender: Sender, content: String) -> ChatMessage {
        let message = ChatMessage {
            id: self.chat_history.len() as u64 + 1,
            sender,
            content,
            timestamp: Utc::now(),
        };
        self.chat_history.push(message.clone());
        message
    }

    fn push_document(
        &mut self,
        name: String,
        summary: String,
        extracted_data: Map<String, Value>,
    ) -> Document {
        let document = Document {
            id: self.documents.len() as u64 + DOCUMENT_ID_BASE + 1,
            name,
            upload_date: Utc::now(),
            summary,
            extracted_data,
        };
        self.documents.push(document.clone());
        document
    }
}

pub fn greeting_for(case_name: &str) -> String {
    format!("Hello! I've created your case '{case_name}'. How can I assist you?")
}

/// Registry of all cases, keyed by id.
///
/// Every operation takes the lock only for the duration of the mutation, so a
/// caller that awaits something between two operations on the same case may
/// see other requests' messages interleaved.
#[derive(Debug, Default)]
pub struct CaseStore {
    cases: RwLock<BTreeMap<u64, Case>>,
}

impl CaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding the parking-ticket demo case.
    pub fn with_demo_case() -> Self {
        let mut case = Case::new(1, "Parking Ticket on Elm St.".to_string());
        let mut extracted = Map::new();
        extracted.insert("fine_amount".to_string(), Value::from(75));
        extracted.insert("due_date".to_string(), Value::from("2025-07-15"));
        extracted.insert("violation".to_string(), Value::from("Expired Meter"));
        case.push_document(
            "parking_ticket.pdf".to_string(),
            "A parking violation for an expired meter. Fine is $75, due by 2025-07-15."
                .to_string(),
            extracted,
        );
        case.push_message(
            Sender::Agent,
            "Hello! I'm your case assistant. I see you've uploaded a parking ticket. How can I help you today?"
                .to_string(),
        );

        let mut cases = BTreeMap::new();
        cases.insert(case.id, case);
        Self {
            cases: RwLock::new(cases),
        }
    }

    /// All cases in id order, which is also creation order.
    pub async fn list_cases(&self) -> Vec<Case> {
        self.cases.read().await.values().cloned().collect()
    }

    /// Create a case named exactly `name`. Only the empty string is rejected.
    pub async fn create_case(&self, name: &str) -> Result<Case, CaseError> {
        if name.is_empty() {
            return Err(CaseError::Validation("Case name is required.".to_string()));
        }

        let mut cases = self.cases.write().await;
        let id = cases.keys().next_back().map_or(1, |max| max + 1);
        let mut case = Case::new(id, name.to_string());
        case.push_message(Sender::Agent, greeting_for(name));
        cases.insert(id, case.clone());

        tracing::info!(case_id = id, "Created case");
        Ok(case)
    }

    pub async fn get_case(&self, id: u64) -> Result<Case, CaseError> {
        self.cases
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(CaseError::NotFound(id))
    }

    pub async fn contains(&self, id: u64) -> bool {
        self.cases.read().await.contains_key(&id)
    }

    pub async fn append_message(
        &self,
        case_id: u64,
        sender: Sender,
        content: impl Into<String>,
    ) -> Result<ChatMessage, CaseError> {
        let mut cases = self.cases.write().await;
        let case = cases
            .get_mut(&case_id)
            .ok_or(CaseError::NotFound(case_id))?;
        Ok(case.push_message(sender, content.into()))
    }

    pub async fn append_document(
        &self,
        case_id: u64,
        name: impl Into<String>,
        summary: impl Into<String>,
        extracted_data: Map<String, Value>,
    ) -> Result<Document, CaseError> {
        let mut cases = self.cases.write().await;
        let case = cases
            .get_mut(&case_id)
            .ok_or(CaseError::NotFound(case_id))?;
        Ok(case.push_document(name.into(), summary.into(), extracted_data))
    }
}
