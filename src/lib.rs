//! # codecrew
//!
//! codecrew is a Rust toolkit for turn-based multi-agent LLM collaboration: two or more
//! LLM-backed participants take turns in a shared conversation to solve a task together,
//! the canonical pair being a code writer and a code executor.
//!
//! The crate provides layered abstractions for:
//!
//! * **Group Chats**: [`GroupChat`] coordinates a fixed participant set through a turn loop
//!   with selection, termination evaluation, and a hard iteration cap, so runs always
//!   converge
//! * **Participants and Adapters**: [`Participant`] definitions (name, instructions,
//!   capabilities) bound to providers through [`AgentAdapter`], including bounded
//!   tool round trips for tool-capable participants
//! * **Turn Selection**: [`selection::TurnSelector`] with a deterministic
//!   [`selection::RuleSelector`] and a judge-based [`selection::ModelSelector`] whose
//!   answers are validated before use
//! * **Termination**: [`termination::TerminationEvaluator`] with deterministic and
//!   judge-based variants, both failing closed
//! * **Sandboxed Execution**: [`sandbox::SandboxExecutor`] evaluates model-generated code
//!   fragments under restricted or unrestricted capability profiles without ever
//!   propagating a fault to the host
//! * **Provider Flexibility**: the [`ClientWrapper`] trait with an Azure OpenAI
//!   implementation routing requests by deployment, plus token caching via
//!   [`auth::TokenCache`]
//!
//! ## Getting Started
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use codecrew::auth::{StaticTokenProvider, TokenCache};
//! use codecrew::{
//!     AgentAdapter, AzureOpenAIClient, CodeCrewConfig, GroupChat, Participant, RuleSelector,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     codecrew::init_logger();
//!
//!     let config = CodeCrewConfig::from_env()?;
//!     let tokens = Arc::new(TokenCache::new(Arc::new(StaticTokenProvider::new(
//!         config.api_key.clone(),
//!     ))));
//!     let client = Arc::new(AzureOpenAIClient::new(&config, tokens));
//!
//!     let mut chat = GroupChat::new("demo").with_selector(Box::new(
//!         RuleSelector::new()
//!             .with_rule("CodeWriter", "CodeExecutor")
//!             .with_rule("CodeExecutor", "CodeWriter"),
//!     ));
//!     chat.add_participant(AgentAdapter::new(
//!         Participant::new("CodeWriter", "Write code to solve the task."),
//!         client.clone(),
//!     ))?;
//!     chat.add_participant(AgentAdapter::new(
//!         Participant::new("CodeExecutor", "Execute the code you are given."),
//!         client.clone(),
//!     ))?;
//!
//!     for message in chat.run("compute 5 factorial").await? {
//!         println!("{}: {}", message.author.as_deref().unwrap_or("?"), message.content);
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once.
///
/// Lightweight on purpose so that applications embedding codecrew can opt in
/// to simple `RUST_LOG` driven diagnostics without choosing a logging backend
/// upfront.
///
/// ```rust
/// codecrew::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::init();
    });
}

// Import the top-level `codecrew` module.
pub mod codecrew;

// Re-exporting key items for easier external access.
pub use codecrew::agent;
pub use codecrew::agent::{collect_chunks, AgentAdapter};
pub use codecrew::auth;
pub use codecrew::client_wrapper;
pub use codecrew::client_wrapper::{
    ChunkStream, ClientWrapper, GenerationParams, Message, MessageChunk, Role, TokenUsage,
};
pub use codecrew::clients;
pub use codecrew::clients::azure::AzureOpenAIClient;
pub use codecrew::config;
pub use codecrew::config::{CodeCrewConfig, ConfigError};
pub use codecrew::group_chat;
pub use codecrew::group_chat::{ChatState, GroupChat, GroupChatError};
pub use codecrew::history;
pub use codecrew::history::{ChatHistory, ChatMessage};
pub use codecrew::participant;
pub use codecrew::participant::{CapabilitySet, Participant};
pub use codecrew::sandbox;
pub use codecrew::sandbox::{ExecutionOutcome, ExecutionProfile, SandboxExecutor, SandboxProtocol};
pub use codecrew::selection;
pub use codecrew::selection::{ModelSelector, RuleSelector, TurnSelector};
pub use codecrew::termination;
pub use codecrew::termination::{HeuristicEvaluator, ModelEvaluator, TerminationEvaluator};
pub use codecrew::tool_protocol;
pub use codecrew::tool_protocol::{
    ToolMetadata, ToolParameter, ToolParameterType, ToolProtocol, ToolRegistry, ToolResult,
};
