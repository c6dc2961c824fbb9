//! Agent adapter: turns one participant's view of the shared history into a
//! single provider exchange.
//!
//! The adapter owns a [`Participant`] definition, a [`ClientWrapper`], and an
//! optional [`ToolRegistry`]. On its turn it renders the shared history into
//! a provider request (system prompt first, every prior turn labeled with its
//! author), sends it, and returns exactly one finished [`ChatMessage`]. The
//! adapter never mutates the shared history; appending the result is the
//! group chat's job.
//!
//! For tool-capable participants the adapter scans each model reply for a
//! JSON fragment of the form `{"tool_call": {"name": "...", "parameters":
//! {...}}}`, executes the named tool through the registry, feeds the result
//! back as a user message, and re-invokes the model. The round trip is
//! bounded; callers always see a single final message regardless of how many
//! tool calls happened in between.

use std::error::Error;
use std::sync::Arc;

use futures_util::StreamExt;

use crate::client_wrapper::{ChunkStream, ClientWrapper, Message, Role};
use crate::history::{ChatHistory, ChatMessage};
use crate::participant::{CapabilitySet, Participant};
use crate::tool_protocol::ToolRegistry;

/// Upper bound on tool round trips within one turn.
const MAX_TOOL_ITERATIONS: usize = 5;

/// A tool invocation extracted from model output.
struct ToolCall {
    name: String,
    parameters: serde_json::Value,
}

/// Binds a participant definition to a provider client and a tool registry.
pub struct AgentAdapter {
    participant: Participant,
    client: Arc<dyn ClientWrapper>,
    tools: ToolRegistry,
}

impl AgentAdapter {
    pub fn new(participant: Participant, client: Arc<dyn ClientWrapper>) -> Self {
        AgentAdapter {
            participant,
            client,
            tools: ToolRegistry::empty(),
        }
    }

    /// Attach a tool registry. Tools are only reachable when the participant
    /// carries the tool-invocation capability.
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn name(&self) -> &str {
        &self.participant.name
    }

    pub fn participant(&self) -> &Participant {
        &self.participant
    }

    /// Produce this participant's next turn from the shared history.
    ///
    /// Tool-capable participants may transparently run a bounded tool round
    /// trip; the caller still receives a single final message. A provider
    /// error aborts the turn and is surfaced unchanged.
    pub async fn invoke(
        &self,
        history: &ChatHistory,
    ) -> Result<ChatMessage, Box<dyn Error + Send + Sync>> {
        let mut request = self.build_request(history);
        let response = self
            .client
            .send_message(&request, Some(&self.participant.params))
            .await?;
        let mut current_response = response.content;

        if self.participant.capability == CapabilitySet::ToolInvocation && !self.tools.is_empty() {
            let mut tool_iteration = 0;
            loop {
                let tool_call = match parse_tool_call(&current_response) {
                    Some(call) => call,
                    None => break,
                };
                if tool_iteration >= MAX_TOOL_ITERATIONS {
                    log::warn!(
                        "agent {}: maximum tool iterations reached",
                        self.participant.name
                    );
                    current_response = format!(
                        "{}\n\n[Warning: Maximum tool iterations reached]",
                        current_response
                    );
                    break;
                }
                tool_iteration += 1;

                let tool_result = self
                    .tools
                    .execute_tool(&tool_call.name, tool_call.parameters)
                    .await;

                let tool_result_message = match &tool_result {
                    Ok(result) if result.success => format!(
                        "Tool '{}' executed successfully. Result: {}",
                        tool_call.name,
                        serde_json::to_string_pretty(&result.output)
                            .unwrap_or_else(|_| format!("{:?}", result.output))
                    ),
                    Ok(result) => format!(
                        "Tool '{}' failed. Error: {}",
                        tool_call.name,
                        result
                            .error
                            .clone()
                            .unwrap_or_else(|| "Unknown error".to_string())
                    ),
                    Err(e) => format!("Tool execution error: {}", e),
                };

                // Feed the tool result back and let the model continue
                request.push(Message {
                    role: Role::Assistant,
                    content: current_response.clone(),
                });
                request.push(Message {
                    role: Role::User,
                    content: tool_result_message,
                });
                let follow_up = self
                    .client
                    .send_message(&request, Some(&self.participant.params))
                    .await?;
                current_response = follow_up.content;
            }
        }

        Ok(ChatMessage::from_participant(
            &self.participant.name,
            &current_response,
        ))
    }

    /// Produce this participant's next turn as a finite chunk stream.
    ///
    /// Streaming turns are chat-only; tool round trips use [`Self::invoke`].
    /// Every chunk is tagged with this participant's name.
    pub async fn invoke_stream(
        &self,
        history: &ChatHistory,
    ) -> Result<ChunkStream, Box<dyn Error + Send + Sync>> {
        let request = self.build_request(history);
        let stream = self
            .client
            .send_message_stream(&request, Some(&self.participant.params))
            .await?;
        let name = self.participant.name.clone();
        Ok(Box::pin(stream.map(move |chunk_result| {
            chunk_result.map(|mut chunk| {
                chunk.author = Some(name.clone());
                chunk
            })
        })))
    }

    /// Render the shared history into a provider request for this
    /// participant: system instructions first, then every message with its
    /// author label so the model can tell the speakers apart.
    fn build_request(&self, history: &ChatHistory) -> Vec<Message> {
        let mut request = Vec::with_capacity(history.len() + 1);
        request.push(Message {
            role: Role::System,
            content: self.system_prompt(),
        });
        for message in history.messages() {
            let content = match &message.author {
                Some(author) => format!("[{}]: {}", author, message.content),
                None => message.content.to_string(),
            };
            let role = match message.role {
                Role::User => Role::User,
                Role::System => Role::System,
                Role::Assistant | Role::Tool => Role::Assistant,
            };
            request.push(Message { role, content });
        }
        request
    }

    fn system_prompt(&self) -> String {
        let mut prompt = self.participant.instructions.clone();
        if self.participant.capability == CapabilitySet::ToolInvocation && !self.tools.is_empty() {
            prompt.push_str("\n\nYou have access to the following tools:\n");
            for tool_metadata in self.tools.list_tools() {
                prompt.push_str(&format!(
                    "- {}: {}\n",
                    tool_metadata.name, tool_metadata.description
                ));
                if !tool_metadata.parameters.is_empty() {
                    prompt.push_str("  Parameters:\n");
                    for param in &tool_metadata.parameters {
                        prompt.push_str(&format!(
                            "    - {} ({:?}): {}\n",
                            param.name,
                            param.param_type,
                            param.description.as_deref().unwrap_or("No description")
                        ));
                    }
                }
            }
            prompt.push_str(
                "\nTo use a tool, respond with a JSON object in the following format:\n\
                 {\"tool_call\": {\"name\": \"tool_name\", \"parameters\": {...}}}\n\
                 After tool execution, you will receive the result and can continue.\n",
            );
        }
        prompt
    }
}

/// Fold a finite chunk stream into one finished message.
///
/// Content is concatenated in arrival order; the first non-empty author name
/// wins. A chunk-level error aborts the fold and is surfaced to the caller.
pub async fn collect_chunks(
    mut stream: ChunkStream,
) -> Result<ChatMessage, Box<dyn Error + Send + Sync>> {
    let mut content = String::new();
    let mut author: Option<String> = None;
    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| e.to_string())?;
        if author.is_none() {
            if let Some(name) = chunk.author.as_deref().filter(|n| !n.is_empty()) {
                author = Some(name.to_string());
            }
        }
        content.push_str(&chunk.content);
    }
    let name = author.unwrap_or_else(|| "assistant".to_string());
    Ok(ChatMessage::from_participant(&name, &content))
}

/// Extract the first tool call from model output.
///
/// Looks for `{"tool_call": {"name": "...", "parameters": {...}}}` using
/// brace counting to find the matching closing brace, which handles the
/// common case where the model wraps the call in surrounding prose.
fn parse_tool_call(response: &str) -> Option<ToolCall> {
    let start_idx = response.find("{\"tool_call\"")?;

    let mut brace_count = 0i32;
    let mut end_idx = start_idx;
    for (i, ch) in response[start_idx..].char_indices() {
        match ch {
            '{' => brace_count += 1,
            '}' => {
                brace_count -= 1;
                if brace_count == 0 {
                    end_idx = start_idx + i + 1;
                    break;
                }
            }
            _ => {}
        }
    }
    if end_idx == start_idx {
        return None;
    }

    let parsed: serde_json::Value = serde_json::from_str(&response[start_idx..end_idx]).ok()?;
    let tool_call_obj = parsed.get("tool_call")?;
    match (
        tool_call_obj.get("name").and_then(|v| v.as_str()),
        tool_call_obj.get("parameters"),
    ) {
        (Some(name), Some(parameters)) => Some(ToolCall {
            name: name.to_string(),
            parameters: parameters.clone(),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tool_call_extracts_from_surrounding_prose() {
        let response = "Let me run that.\n\
                        {\"tool_call\": {\"name\": \"execute_code\", \"parameters\": {\"code\": \"x = 2 + 2\"}}}\n\
                        Done.";
        let call = parse_tool_call(response).unwrap();
        assert_eq!(call.name, "execute_code");
        assert_eq!(call.parameters["code"], "x = 2 + 2");
    }

    #[test]
    fn parse_tool_call_ignores_plain_text() {
        assert!(parse_tool_call("The result is 120.").is_none());
    }

    #[test]
    fn parse_tool_call_rejects_unbalanced_fragment() {
        assert!(parse_tool_call("{\"tool_call\": {\"name\": \"x\"").is_none());
    }
}
