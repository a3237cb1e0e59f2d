//! AI gateway abstraction.
//!
//! The hosted model is treated as an opaque function from a prompt (and
//! optionally an image) to text.

mod gemini;

pub use gemini::GeminiGateway;

use async_trait::async_trait;

use crate::error::GatewayError;

/// A hosted generative model.
#[async_trait]
pub trait AiGateway: Send + Sync {
    /// Model identifier, for logs.
    fn model_name(&self) -> &str;

    /// Plain text completion.
    async fn complete(&self, prompt: &str) -> Result<String, GatewayError>;

    /// Completion over a prompt plus one inline image.
    async fn complete_with_image(
        &self,
        prompt: &str,
        image: &[u8],
        mime_type: &str,
    ) -> Result<String, GatewayError>;
}
