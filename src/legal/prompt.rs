//! Prompt assembly for chat turns and document extraction.

use std::fmt::Write;

use crate::legal::case::Case;
use crate::legal::redaction::redact_pii;

const SYSTEM_INSTRUCTION: &str = "You are a helpful and empathetic legal case assistant. Do not provide legal advice, but help the user understand their situation based on the information provided.";
const NO_DOCUMENTS: &str = "No documents have been uploaded for this case yet.";
const CLOSING_INSTRUCTION: &str =
    "Based on all the information above, provide a helpful and concise answer to the new user question.";

/// Instruction sent alongside an uploaded document image.
pub const DOCUMENT_EXTRACTION_PROMPT: &str = r#"You are an expert data extractor for legal documents. Analyze the attached image of a document.
First, provide a one-sentence summary of the document's purpose.
Second, extract key information like dates, names, amounts, case numbers, and violation types.

Return the information as a single, valid JSON object with two keys: "summary" and "extracted_data".
The value for "extracted_data" should be another JSON object containing the extracted fields.

Example response format:
{
  "summary": "This is a court notice for a hearing.",
  "extracted_data": {
    "case_number": "CV-12345",
    "hearing_date": "2025-10-20",
    "fine_amount": 250
  }
}"#;

/// Prompt used by the connectivity probe.
pub const PROBE_PROMPT: &str = "Say 'Hello, World!'";

/// Build the chat prompt for `case`.
///
/// `case` must already contain the new user message; `redacted_question` is the
/// same message after PII masking. History lines are masked here as well.
pub fn build_chat_prompt(case: &Case, redacted_question: &str) -> String {
    let mut prompt = String::with_capacity(1024);
    prompt.push_str(SYSTEM_INSTRUCTION);
    prompt.push_str("\n\n--- Case Document Summaries ---\n");
    if case.documents.is_empty() {
        prompt.push_str(NO_DOCUMENTS);
        prompt.push('\n');
    } else {
        for doc in &case.documents {
            let _ = writeln!(prompt, "Document '{}': {}", doc.name, doc.summary);
        }
    }

    prompt.push_str("\n--- Conversation History ---\n");
    for msg in &case.chat_history {
        let _ = writeln!(prompt, "{}: {}", msg.sender.label(), redact_pii(&msg.content));
    }

    let _ = write!(
        prompt,
        "\n--- New User Question ---\nUser: {redacted_question}\n\n---\n{CLOSING_INSTRUCTION}"
    );
    prompt
}
