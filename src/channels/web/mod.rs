//! HTTP gateway: the case API plus the embedded browser UI.

pub mod server;
pub mod types;
