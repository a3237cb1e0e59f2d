//! Case domain: the in-memory store, prompt assembly and PII redaction.

pub mod assistant;
pub mod case;
pub mod prompt;
pub mod redaction;
