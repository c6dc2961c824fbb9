//! Termination evaluation: is the task done.
//!
//! Evaluators are pure over the history and fail closed: when a judge model
//! is unreachable or returns something unparseable, the verdict is "not
//! complete" and the conversation continues (the iteration cap still bounds
//! it). Latching a `Complete` verdict is the group chat's job; evaluators
//! themselves stay stateless.

use std::sync::Arc;

use async_trait::async_trait;

use crate::client_wrapper::{ClientWrapper, GenerationParams, Message, Role};
use crate::history::ChatHistory;

/// Decides whether the most recent turn satisfied the task.
#[async_trait]
pub trait TerminationEvaluator: Send + Sync {
    async fn is_complete(&self, history: &ChatHistory) -> bool;
}

/// Deterministic evaluator: the task is complete when the last message
/// contains no correction language. An empty history is never complete.
pub struct HeuristicEvaluator {
    markers: Vec<String>,
}

impl Default for HeuristicEvaluator {
    fn default() -> Self {
        HeuristicEvaluator {
            markers: [
                "error",
                "incorrect",
                "wrong",
                "fix",
                "try again",
                "suggest",
                "revise",
                "does not",
                "doesn't",
            ]
            .iter()
            .map(|m| m.to_string())
            .collect(),
        }
    }
}

impl HeuristicEvaluator {
    /// Override the correction markers scanned for.
    pub fn with_markers(markers: Vec<String>) -> Self {
        HeuristicEvaluator { markers }
    }
}

#[async_trait]
impl TerminationEvaluator for HeuristicEvaluator {
    async fn is_complete(&self, history: &ChatHistory) -> bool {
        match history.last() {
            Some(message) => {
                let content = message.content.to_lowercase();
                !self.markers.iter().any(|marker| content.contains(marker))
            }
            None => false,
        }
    }
}

/// Keyword the judge is instructed to answer with when the task is done.
pub const TERMINATION_KEYWORD: &str = "yes";

/// Judge-based evaluator: a model reads the last turn and answers with the
/// termination keyword if the task is satisfied. Fails closed.
pub struct ModelEvaluator {
    client: Arc<dyn ClientWrapper>,
    keyword: String,
    params: GenerationParams,
}

impl ModelEvaluator {
    pub fn new(client: Arc<dyn ClientWrapper>) -> Self {
        ModelEvaluator {
            client,
            keyword: TERMINATION_KEYWORD.to_string(),
            params: GenerationParams::default()
                .with_temperature(0.0)
                .with_max_tokens(10),
        }
    }

    fn judge_prompt(&self, history: &ChatHistory) -> String {
        let last = history
            .last()
            .map(|m| m.content.to_string())
            .unwrap_or_default();
        format!(
            "Examine the RESPONSE and determine whether the content has been deemed \
             satisfactory.\n\
             If content is satisfactory, respond with a single word without explanation: {}.\n\
             If specific suggestions are being provided, it is not satisfactory.\n\
             If no correction is suggested, it is satisfactory.\n\n\
             RESPONSE:\n{}",
            self.keyword, last
        )
    }
}

#[async_trait]
impl TerminationEvaluator for ModelEvaluator {
    async fn is_complete(&self, history: &ChatHistory) -> bool {
        if history.is_empty() {
            return false;
        }
        let request = [Message {
            role: Role::User,
            content: self.judge_prompt(history),
        }];
        match self.client.send_message(&request, Some(&self.params)).await {
            Ok(reply) => reply
                .content
                .to_lowercase()
                .contains(&self.keyword.to_lowercase()),
            Err(e) => {
                log::warn!("termination judge unavailable ({}), continuing", e);
                false
            }
        }
    }
}
