use async_trait::async_trait;
use futures_util::Stream;
use std::error::Error;
use std::pin::Pin;
use std::sync::Mutex;

/// A ClientWrapper is a wrapper around a specific chat-completion provider.
/// It provides a common interface to send a conversation and receive a reply.
/// It does not keep track of the conversation itself, for that we use a
/// `ChatHistory` owned by a `GroupChat`, which uses `AgentAdapter`s (each
/// holding a ClientWrapper) to produce participant turns.

/// Represents the possible roles for a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Role {
    // set by the adapter to steer the model's responses
    System,
    // a message sent by a human user (or app user)
    User,
    // content the model generated as a response
    Assistant,
    // output of a tool invocation, relayed back to the model
    Tool,
}

/// How many tokens were spent on prompt vs. completion.
#[derive(Clone, Debug, Default)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
}

/// Represents a generic message to be sent to a provider.
#[derive(Clone, Debug)]
pub struct Message {
    /// The role associated with the message.
    pub role: Role,
    /// The actual content of the message.
    pub content: String,
}

/// Represents a chunk of a streaming message response.
#[derive(Clone, Debug)]
pub struct MessageChunk {
    /// Name of the participant this chunk belongs to, when known.
    pub author: Option<String>,
    /// The incremental content in this chunk.
    pub content: String,
    /// Whether this is the final chunk in the stream.
    pub is_final: bool,
}

/// Per-request generation knobs a participant carries.
///
/// `temperature: Some(0.0)` is how deterministic participants (code writers,
/// judges) are pinned down; `max_tokens` bounds the reply size.
#[derive(Clone, Debug, Default)]
pub struct GenerationParams {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl GenerationParams {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Type alias for a Send-able error box
pub type SendError = Box<dyn Error + Send>;

/// A finite stream of message chunks. The provider SDK's chunk stream is not
/// `Send`, so neither is this alias; consume it on the task that opened it.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<MessageChunk, SendError>>>>;

/// Trait defining the interface to interact with chat-completion providers.
#[async_trait]
pub trait ClientWrapper: Send + Sync {
    /// The model or deployment identifier requests are routed to.
    fn model_name(&self) -> &str;

    /// Send a conversation to the provider and get a single reply.
    /// - `messages`: the full request conversation, system prompt first.
    /// - `params`: optional generation knobs for this request.
    async fn send_message(
        &self,
        messages: &[Message],
        params: Option<&GenerationParams>,
    ) -> Result<Message, Box<dyn Error + Send + Sync>>;

    /// Send a conversation and get a streaming reply.
    /// This method has a default implementation that returns an error, so
    /// implementations that cannot stream don't break. Clients that support
    /// streaming should override this.
    async fn send_message_stream(
        &self,
        _messages: &[Message],
        _params: Option<&GenerationParams>,
    ) -> Result<ChunkStream, Box<dyn Error + Send + Sync>> {
        Err("Streaming not supported by this client".into())
    }

    /// Hook to retrieve usage from the *last* send_message() call.
    /// Default impl returns None so wrappers without accounting don't break.
    fn get_last_usage(&self) -> Option<TokenUsage> {
        self.usage_slot()
            .and_then(|slot| slot.lock().ok().and_then(|u| u.clone()))
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        // Implementations supporting TokenUsage tracking should override this.
        None
    }
}
