//! Turn selection: who speaks next.
//!
//! Selectors are infallible by contract. [`RuleSelector`] is deterministic
//! and always returns a valid name. [`ModelSelector`] asks a judge model but
//! validates its answer against the participant set and the
//! no-consecutive-turns rule, correcting anything invalid through the rule
//! fallback, so a confused or unreachable judge degrades the selection,
//! never the chat.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::client_wrapper::{ClientWrapper, GenerationParams, Message, Role};
use crate::history::ChatHistory;

/// Decides which participant takes the next turn.
///
/// `participants` is the registration-ordered name list; implementations
/// must return one of those names and must not repeat the most recent
/// speaker when more than one participant exists.
#[async_trait]
pub trait TurnSelector: Send + Sync {
    async fn select(&self, history: &ChatHistory, participants: &[String]) -> String;
}

/// Deterministic selector backed by a fixed "after X comes Y" table.
///
/// When the table has no entry for the current speaker (or the last message
/// was user input), selection falls back to registration order: the first
/// participant after fresh input, otherwise the next name after the current
/// speaker, wrapping around.
#[derive(Default)]
pub struct RuleSelector {
    rules: HashMap<String, String>,
}

impl RuleSelector {
    pub fn new() -> Self {
        RuleSelector::default()
    }

    /// After `speaker` has spoken, `next` takes the turn.
    pub fn with_rule(mut self, speaker: &str, next: &str) -> Self {
        self.rules.insert(speaker.to_string(), next.to_string());
        self
    }
}

/// Registration-order fallback shared by both selectors.
fn next_in_order(participants: &[String], last_author: Option<&str>) -> String {
    match last_author.and_then(|last| participants.iter().position(|name| name == last)) {
        Some(pos) => participants[(pos + 1) % participants.len()].clone(),
        None => participants
            .first()
            .cloned()
            .unwrap_or_default(),
    }
}

#[async_trait]
impl TurnSelector for RuleSelector {
    async fn select(&self, history: &ChatHistory, participants: &[String]) -> String {
        let last_author = history.last_author();
        if let Some(last) = last_author {
            if let Some(next) = self.rules.get(last) {
                if participants.iter().any(|name| name == next) && next != last {
                    return next.clone();
                }
            }
        }
        next_in_order(participants, last_author)
    }
}

/// Judge-based selector: a model reads the transcript and names the next
/// speaker. The answer is validated; anything out-of-set, repeated, or
/// unparseable is corrected through the registration-order fallback.
pub struct ModelSelector {
    client: Arc<dyn ClientWrapper>,
    params: GenerationParams,
}

impl ModelSelector {
    pub fn new(client: Arc<dyn ClientWrapper>) -> Self {
        ModelSelector {
            client,
            // the judge should be deterministic and terse
            params: GenerationParams::default()
                .with_temperature(0.0)
                .with_max_tokens(50),
        }
    }

    fn judge_prompt(history: &ChatHistory, participants: &[String]) -> String {
        let mut roster = String::new();
        for name in participants {
            roster.push_str(&format!("- {}\n", name));
        }
        format!(
            "Determine which participant takes the next turn in a conversation based on the \
             most recent participant.\n\
             State only the name of the participant to take the next turn.\n\
             No participant should take more than one turn in a row.\n\n\
             Choose only from these participants:\n{}\n\
             History:\n{}",
            roster,
            history.transcript()
        )
    }
}

#[async_trait]
impl TurnSelector for ModelSelector {
    async fn select(&self, history: &ChatHistory, participants: &[String]) -> String {
        let last_author = history.last_author();
        let request = [Message {
            role: Role::User,
            content: Self::judge_prompt(history, participants),
        }];

        match self.client.send_message(&request, Some(&self.params)).await {
            Ok(reply) => {
                let verdict = reply.content.trim();
                // accept the first roster name the verdict mentions
                let chosen = participants
                    .iter()
                    .find(|name| verdict.contains(name.as_str()));
                match chosen {
                    Some(name) if Some(name.as_str()) != last_author => name.clone(),
                    Some(name) => {
                        log::warn!(
                            "turn judge repeated the current speaker '{}', using order fallback",
                            name
                        );
                        next_in_order(participants, last_author)
                    }
                    None => {
                        log::warn!(
                            "turn judge returned no known participant ({:?}), using order fallback",
                            verdict
                        );
                        next_in_order(participants, last_author)
                    }
                }
            }
            Err(e) => {
                log::warn!("turn judge unavailable ({}), using order fallback", e);
                next_in_order(participants, last_author)
            }
        }
    }
}
