//! Turn-based group chat orchestration.
//!
//! A [`GroupChat`] owns the shared [`ChatHistory`], a fixed set of
//! participant adapters, a [`TurnSelector`], a [`TerminationEvaluator`], and
//! an iteration cap. [`GroupChat::invoke`] drives the loop: select the next
//! speaker, let its adapter produce a turn, append it, evaluate termination
//! when the speaker is eligible, repeat. The cap forces completion
//! regardless of what the evaluator says, so a run can never spin forever.
//!
//! State machine: `Idle → Running → (Complete | Aborted)`, with
//! [`GroupChat::reset`] returning any state to `Idle` with an empty history.
//! After `Complete` the chat is re-entrant: append more user input and
//! invoke again.

use std::collections::HashSet;
use std::error::Error;
use std::fmt;

use crate::agent::AgentAdapter;
use crate::history::{ChatHistory, ChatMessage};
use crate::selection::{RuleSelector, TurnSelector};
use crate::termination::{HeuristicEvaluator, TerminationEvaluator};

/// Default bound on participant turns per invocation.
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Lifecycle of a group chat.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatState {
    /// No invocation in flight; history may or may not be empty.
    Idle,
    /// An invocation is driving the turn loop.
    Running,
    /// The last invocation finished (evaluator verdict or iteration cap).
    Complete,
    /// The last invocation failed on a provider error.
    Aborted,
}

/// Errors surfaced by group chat operations.
#[derive(Debug, Clone)]
pub enum GroupChatError {
    /// A participant with the same name is already registered.
    DuplicateParticipant(String),
    /// `invoke` was called with no participants registered.
    NoParticipants,
    /// A participant's provider call failed; the chat was aborted.
    TurnFailed { participant: String, message: String },
}

impl fmt::Display for GroupChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupChatError::DuplicateParticipant(name) => {
                write!(f, "participant already registered: {}", name)
            }
            GroupChatError::NoParticipants => {
                write!(f, "group chat has no participants")
            }
            GroupChatError::TurnFailed {
                participant,
                message,
            } => {
                write!(f, "turn by '{}' failed: {}", participant, message)
            }
        }
    }
}

impl Error for GroupChatError {}

/// A turn-based conversation among a fixed set of participants.
pub struct GroupChat {
    name: String,
    adapters: Vec<AgentAdapter>,
    selector: Box<dyn TurnSelector>,
    evaluator: Box<dyn TerminationEvaluator>,
    /// Names whose turns are allowed to trigger termination evaluation.
    /// Empty set means every speaker is eligible.
    termination_speakers: HashSet<String>,
    history: ChatHistory,
    max_iterations: usize,
    state: ChatState,
}

impl GroupChat {
    /// A chat with rule-based selection, heuristic termination, and the
    /// default iteration cap.
    pub fn new(name: &str) -> Self {
        GroupChat {
            name: name.to_string(),
            adapters: Vec::new(),
            selector: Box::new(RuleSelector::new()),
            evaluator: Box::new(HeuristicEvaluator::default()),
            termination_speakers: HashSet::new(),
            history: ChatHistory::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            state: ChatState::Idle,
        }
    }

    pub fn with_selector(mut self, selector: Box<dyn TurnSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_evaluator(mut self, evaluator: Box<dyn TerminationEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Restrict termination evaluation to turns spoken by `name`. May be
    /// called multiple times to allow several speakers.
    pub fn with_termination_speaker(mut self, name: &str) -> Self {
        self.termination_speakers.insert(name.to_string());
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Register a participant. Names must be unique within the chat.
    pub fn add_participant(&mut self, adapter: AgentAdapter) -> Result<(), GroupChatError> {
        if self.adapters.iter().any(|a| a.name() == adapter.name()) {
            return Err(GroupChatError::DuplicateParticipant(
                adapter.name().to_string(),
            ));
        }
        self.adapters.push(adapter);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ChatState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == ChatState::Complete
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Append external user input to the history. Does not start a run.
    pub fn add_user_message(&mut self, content: &str) {
        self.history.push(ChatMessage::user(content));
    }

    /// Append `user_message` and drive the turn loop to completion.
    pub async fn run(&mut self, user_message: &str) -> Result<Vec<ChatMessage>, GroupChatError> {
        self.add_user_message(user_message);
        self.invoke().await
    }

    /// Drive the turn loop until the evaluator reports completion or the
    /// iteration cap is reached (which forces completion). Returns the
    /// participant turns produced by this invocation, in order; they are
    /// also appended to the shared history.
    ///
    /// A provider failure aborts the run: state becomes [`ChatState::Aborted`],
    /// the error is returned, and the history keeps every turn produced
    /// before the failure.
    pub async fn invoke(&mut self) -> Result<Vec<ChatMessage>, GroupChatError> {
        if self.adapters.is_empty() {
            return Err(GroupChatError::NoParticipants);
        }

        self.state = ChatState::Running;
        let names: Vec<String> = self.adapters.iter().map(|a| a.name().to_string()).collect();
        let mut produced = Vec::new();
        let mut iterations = 0;

        while iterations < self.max_iterations {
            let last_author = self.history.last_author().map(str::to_string);
            let mut speaker = self.selector.select(&self.history, &names).await;

            // Hard post-condition regardless of selector implementation:
            // the chosen name must be registered and must not repeat the
            // current speaker.
            let invalid = !names.iter().any(|name| name == &speaker)
                || (names.len() > 1 && Some(speaker.as_str()) == last_author.as_deref());
            if invalid {
                let corrected = fallback_speaker(&names, last_author.as_deref());
                log::warn!(
                    "chat {}: selector chose '{}', corrected to '{}'",
                    self.name,
                    speaker,
                    corrected
                );
                speaker = corrected;
            }

            log::info!(
                "chat {}: {} -> {}",
                self.name,
                last_author.as_deref().unwrap_or("user"),
                speaker
            );

            let turn_result = {
                let adapter = self
                    .adapters
                    .iter()
                    .find(|a| a.name() == speaker)
                    .unwrap_or(&self.adapters[0]);
                adapter.invoke(&self.history).await
            };

            let message = match turn_result {
                Ok(message) => message,
                Err(e) => {
                    log::error!("chat {}: turn by '{}' failed: {}", self.name, speaker, e);
                    self.state = ChatState::Aborted;
                    return Err(GroupChatError::TurnFailed {
                        participant: speaker,
                        message: e.to_string(),
                    });
                }
            };

            self.history.push(message.clone());
            produced.push(message);
            iterations += 1;

            let eligible = self.termination_speakers.is_empty()
                || self.termination_speakers.contains(&speaker);
            if eligible && self.evaluator.is_complete(&self.history).await {
                log::info!(
                    "chat {}: complete after {} iteration(s)",
                    self.name,
                    iterations
                );
                break;
            }
        }

        // Reaching the cap forces completion; the loop never spins forever.
        self.state = ChatState::Complete;
        Ok(produced)
    }

    /// Clear the history and return to [`ChatState::Idle`] from any state.
    pub fn reset(&mut self) {
        self.history.clear();
        self.state = ChatState::Idle;
    }
}

/// Registration-order correction applied when a selector's answer violates
/// the membership or no-repeat rules.
fn fallback_speaker(names: &[String], last_author: Option<&str>) -> String {
    match last_author.and_then(|last| names.iter().position(|name| name == last)) {
        Some(pos) => names[(pos + 1) % names.len()].clone(),
        None => names[0].clone(),
    }
}
