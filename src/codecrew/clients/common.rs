use crate::client_wrapper::{GenerationParams, MessageChunk, SendError, TokenUsage};
use futures_util::Stream;
use lazy_static::lazy_static;
use openai_rust::chat;
use openai_rust2 as openai_rust;
use std::error::Error;
use std::fmt;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

lazy_static! {
    /// Shared connection pool reused by every provider client in the
    /// process. Idle connections are kept warm so sequential turns don't
    /// pay the TLS handshake each time.
    static ref SHARED_HTTP_CLIENT: reqwest::Client = reqwest::ClientBuilder::new()
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .pool_max_idle_per_host(10)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .timeout(Duration::from_secs(300))
        .build()
        .expect("failed to build shared HTTP client");
}

pub fn get_shared_http_client() -> &'static reqwest::Client {
    &SHARED_HTTP_CLIENT
}

/// Error wrapper for stream chunk failures.
#[derive(Debug)]
pub struct StreamError(pub String);

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Error for StreamError {}

/// Apply participant generation knobs to a request.
fn apply_params(mut arguments: chat::ChatArguments, params: Option<&GenerationParams>) -> chat::ChatArguments {
    if let Some(params) = params {
        if let Some(temperature) = params.temperature {
            arguments.temperature = Some(temperature);
        }
        if let Some(max_tokens) = params.max_tokens {
            arguments.max_tokens = Some(max_tokens);
        }
    }
    arguments
}

/// Send a chat request, record its usage, and return the assistant's content.
pub async fn send_and_track(
    api: &openai_rust::Client,
    model: &str,
    formatted_msgs: Vec<chat::Message>,
    url_path: Option<String>,
    usage_slot: &Mutex<Option<TokenUsage>>,
    params: Option<&GenerationParams>,
) -> Result<String, Box<dyn Error + Send + Sync>> {
    let chat_arguments = apply_params(chat::ChatArguments::new(model, formatted_msgs), params);

    let response = api.create_chat(chat_arguments, url_path).await;

    match response {
        Ok(response) => {
            let usage = TokenUsage {
                input_tokens: response.usage.prompt_tokens as usize,
                output_tokens: response.usage.completion_tokens as usize,
                total_tokens: response.usage.total_tokens as usize,
            };

            // Store it for get_last_usage()
            if let Ok(mut slot) = usage_slot.lock() {
                *slot = Some(usage);
            }

            match response.choices.first() {
                Some(choice) => Ok(choice.message.content.clone()),
                None => Err("provider returned no choices".into()),
            }
        }
        Err(err) => {
            log::error!(
                "codecrew::clients::common::send_and_track(...): provider API error: {}",
                err
            );
            Err(err.to_string().into())
        }
    }
}

/// Send a streaming chat request and return a stream of [`MessageChunk`]s.
/// Note: token usage tracking is not available for streaming responses.
pub async fn send_and_track_stream(
    api: &openai_rust::Client,
    model: &str,
    formatted_msgs: Vec<chat::Message>,
    url_path: Option<String>,
    params: Option<&GenerationParams>,
) -> Result<Pin<Box<dyn Stream<Item = Result<MessageChunk, SendError>>>>, Box<dyn Error + Send + Sync>>
{
    use futures_util::StreamExt;

    let chat_arguments = apply_params(chat::ChatArguments::new(model, formatted_msgs), params);

    let chunk_stream = match api.create_chat_stream(chat_arguments, url_path).await {
        Ok(stream) => stream,
        Err(err) => {
            log::error!(
                "codecrew::clients::common::send_and_track_stream(...): provider API error: {}",
                err
            );
            return Err(err.to_string().into());
        }
    };

    // Map the chunks to our MessageChunk type lazily; the provider stream is
    // not Send, which is why ChunkStream carries no Send bound.
    let message_stream = chunk_stream.map(|chunk_result| match chunk_result {
        Ok(chunk) => {
            let content = chunk
                .choices
                .first()
                .and_then(|choice| choice.delta.content.clone())
                .unwrap_or_default();
            let is_final = chunk
                .choices
                .first()
                .and_then(|choice| choice.finish_reason.clone())
                .is_some();
            Ok(MessageChunk {
                author: None,
                content,
                is_final,
            })
        }
        Err(err) => {
            Err(Box::new(StreamError(format!("Stream chunk error: {}", err))) as SendError)
        }
    });

    Ok(Box::pin(message_stream))
}
