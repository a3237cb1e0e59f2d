//! Runtime configuration resolved from the environment.

mod gateway;
pub(crate) mod helpers;

pub use gateway::{
    DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL, GatewayConfig, GeminiConfig, LoggingConfig,
};
