//! caseaid: a legal-aid case assistant.
//!
//! Cases, chat history and uploaded documents live in an in-memory store.
//! Chat replies and document extraction are delegated to a hosted generative
//! AI service behind the [`llm::AiGateway`] trait.

pub mod channels;
pub mod config;
pub mod error;
pub mod legal;
pub mod llm;
