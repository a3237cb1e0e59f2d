//! Request and response DTOs for the case gateway API.

use serde::{Deserialize, Serialize};

// --- Cases ---

#[derive(Debug, Deserialize)]
pub struct CreateCaseRequest {
    #[serde(default)]
    pub name: Option<String>,
}

// --- Chat ---

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

// --- Gateway probe ---

#[derive(Debug, Serialize)]
pub struct GatewayProbeResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub response: String,
}

// --- Health ---

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub channel: &'static str,
    pub ai_configured: bool,
    pub uptime_secs: u64,
}
