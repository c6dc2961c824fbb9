//! The `AzureOpenAIClient` struct implements `ClientWrapper` for Azure OpenAI
//! chat-completions deployments.
//!
//! Azure routes requests by resource endpoint, deployment name, and API
//! version rather than a bare model identifier, so every request is sent to
//! `/openai/deployments/{deployment}/chat/completions?api-version={version}`
//! on the configured endpoint. The bearer secret is taken from a
//! [`TokenCache`] on each request, so expiring managed-identity credentials
//! refresh transparently mid-conversation.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use codecrew::{AzureOpenAIClient, ClientWrapper, CodeCrewConfig, Message, Role};
//! use codecrew::auth::{StaticTokenProvider, TokenCache};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = CodeCrewConfig::from_env()?;
//!     let tokens = Arc::new(TokenCache::new(Arc::new(StaticTokenProvider::new(
//!         config.api_key.clone(),
//!     ))));
//!     let client = AzureOpenAIClient::new(&config, tokens);
//!
//!     let reply = client
//!         .send_message(
//!             &[Message { role: Role::User, content: "Hello!".into() }],
//!             None,
//!         )
//!         .await?;
//!     println!("{}", reply.content);
//!     Ok(())
//! }
//! ```

use std::error::Error;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use openai_rust::chat;
use openai_rust2 as openai_rust;

use crate::auth::TokenCache;
use crate::client_wrapper::{
    ChunkStream, ClientWrapper, GenerationParams, Message, Role, TokenUsage,
};
use crate::clients::common::{get_shared_http_client, send_and_track, send_and_track_stream};
use crate::config::CodeCrewConfig;

/// Client wrapper for an Azure OpenAI chat-completions deployment.
pub struct AzureOpenAIClient {
    endpoint: String,
    deployment: String,
    api_version: String,
    tokens: Arc<TokenCache>,
    /// Storage for the token usage returned by the most recent request.
    token_usage: Mutex<Option<TokenUsage>>,
}

impl AzureOpenAIClient {
    pub fn new(config: &CodeCrewConfig, tokens: Arc<TokenCache>) -> Self {
        Self::new_with_parts(
            &config.endpoint,
            &config.deployment,
            &config.api_version,
            tokens,
        )
    }

    pub fn new_with_parts(
        endpoint: &str,
        deployment: &str,
        api_version: &str,
        tokens: Arc<TokenCache>,
    ) -> Self {
        AzureOpenAIClient {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            deployment: deployment.to_string(),
            api_version: api_version.to_string(),
            tokens,
            token_usage: Mutex::new(None),
        }
    }

    fn url_path(&self) -> String {
        format!(
            "/openai/deployments/{}/chat/completions?api-version={}",
            self.deployment, self.api_version
        )
    }

    /// Build a per-request SDK client carrying the current bearer secret.
    async fn api(&self) -> Result<openai_rust::Client, Box<dyn Error + Send + Sync>> {
        let bearer = self.tokens.bearer().await?;
        Ok(openai_rust::Client::new_with_client_and_base_url(
            &bearer,
            get_shared_http_client().clone(),
            &self.endpoint,
        ))
    }

    fn to_wire(messages: &[Message]) -> Vec<chat::Message> {
        let mut formatted_messages = Vec::with_capacity(messages.len());
        for msg in messages {
            formatted_messages.push(chat::Message {
                role: match msg.role {
                    Role::System => "system".to_owned(),
                    Role::User => "user".to_owned(),
                    Role::Assistant => "assistant".to_owned(),
                    // tool output is relayed as user content; we don't
                    // carry provider-side tool-call ids
                    Role::Tool => "user".to_owned(),
                },
                content: msg.content.clone(),
            });
        }
        formatted_messages
    }
}

#[async_trait]
impl ClientWrapper for AzureOpenAIClient {
    fn model_name(&self) -> &str {
        &self.deployment
    }

    async fn send_message(
        &self,
        messages: &[Message],
        params: Option<&GenerationParams>,
    ) -> Result<Message, Box<dyn Error + Send + Sync>> {
        let api = self.api().await?;
        let content = send_and_track(
            &api,
            &self.deployment,
            Self::to_wire(messages),
            Some(self.url_path()),
            &self.token_usage,
            params,
        )
        .await?;

        Ok(Message {
            role: Role::Assistant,
            content,
        })
    }

    async fn send_message_stream(
        &self,
        messages: &[Message],
        params: Option<&GenerationParams>,
    ) -> Result<ChunkStream, Box<dyn Error + Send + Sync>> {
        let api = self.api().await?;
        send_and_track_stream(
            &api,
            &self.deployment,
            Self::to_wire(messages),
            Some(self.url_path()),
            params,
        )
        .await
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        Some(&self.token_usage)
    }
}
