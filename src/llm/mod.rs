//! LLM integration for Briefing Assist.
//!
//! Uses rig-core for the Gemini transport and `RigAdapter` to bridge rig's
//! `CompletionModel` trait to our `LlmProvider` trait.

pub mod provider;
mod rig_adapter;

pub use provider::*;
pub use rig_adapter::RigAdapter;

use std::sync::Arc;

use rig::client::CompletionClient;
use secrecy::ExposeSecret;

use crate::config::BriefingConfig;
use crate::error::LlmError;

/// Create the Gemini provider from configuration.
pub fn create_provider(config: &BriefingConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    use rig::providers::gemini;

    let client: rig::client::Client<gemini::client::GeminiExt> =
        gemini::Client::new(config.api_key.expose_secret()).map_err(|e| {
            LlmError::RequestFailed {
                provider: "gemini".to_string(),
                reason: format!("Failed to create Gemini client: {}", e),
            }
        })?;

    let model = client.completion_model(&config.model);
    tracing::info!("Using Gemini (model: {})", config.model);
    Ok(Arc::new(RigAdapter::new(model, &config.model, "gemini")))
}
