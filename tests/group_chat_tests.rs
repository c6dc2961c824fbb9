use std::collections::VecDeque;
use std::error::Error;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use codecrew::client_wrapper::{ClientWrapper, GenerationParams, Message, Role};
use codecrew::history::ChatHistory;
use codecrew::sandbox::{ExecutionProfile, SandboxExecutor, SandboxProtocol};
use codecrew::termination::TerminationEvaluator;
use codecrew::tool_protocol::ToolRegistry;
use codecrew::{
    AgentAdapter, ChatState, GroupChat, GroupChatError, HeuristicEvaluator, Participant,
    RuleSelector,
};

struct MockClient {
    name: String,
    responses: Mutex<VecDeque<String>>,
    default_response: String,
}

impl MockClient {
    fn scripted(responses: &[&str]) -> Self {
        MockClient {
            name: "mock".to_string(),
            responses: Mutex::new(responses.iter().map(|r| r.to_string()).collect()),
            default_response: "working on it".to_string(),
        }
    }
}

#[async_trait]
impl ClientWrapper for MockClient {
    fn model_name(&self) -> &str {
        &self.name
    }

    async fn send_message(
        &self,
        _messages: &[Message],
        _params: Option<&GenerationParams>,
    ) -> Result<Message, Box<dyn Error + Send + Sync>> {
        let content = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_response.clone());
        Ok(Message {
            role: Role::Assistant,
            content,
        })
    }
}

struct FailingClient;

#[async_trait]
impl ClientWrapper for FailingClient {
    fn model_name(&self) -> &str {
        "failing"
    }

    async fn send_message(
        &self,
        _messages: &[Message],
        _params: Option<&GenerationParams>,
    ) -> Result<Message, Box<dyn Error + Send + Sync>> {
        Err("provider unavailable".into())
    }
}

struct NeverComplete;

#[async_trait]
impl TerminationEvaluator for NeverComplete {
    async fn is_complete(&self, _history: &ChatHistory) -> bool {
        false
    }
}

fn writer_executor_selector() -> RuleSelector {
    RuleSelector::new()
        .with_rule("CodeWriter", "CodeExecutor")
        .with_rule("CodeExecutor", "CodeWriter")
}

const FACTORIAL_FRAGMENT: &str =
    "result = 1; result = result * 2; result = result * 3; result = result * 4; result = result * 5";

/// A writer/executor pair scripted to solve "compute 5 factorial": the
/// writer emits a fragment binding `result` to 120 and the executor runs it
/// through the real sandbox tool.
async fn factorial_chat() -> (GroupChat, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let executor_sandbox = SandboxExecutor::new(ExecutionProfile::Restricted)
        .with_artifact_path(dir.path().join("generated_code.txt"));
    let mut registry = ToolRegistry::empty();
    registry
        .add_protocol(Arc::new(SandboxProtocol::new(executor_sandbox)))
        .await
        .unwrap();

    let tool_call = format!(
        "{{\"tool_call\": {{\"name\": \"execute_code\", \"parameters\": {{\"code\": \"{}\"}}}}}}",
        FACTORIAL_FRAGMENT
    );

    let writer_client = Arc::new(MockClient::scripted(&[FACTORIAL_FRAGMENT]));
    let executor_client = Arc::new(MockClient::scripted(&[
        &tool_call,
        "The computation finished. result is 120.",
    ]));

    let mut chat = GroupChat::new("factorial")
        .with_selector(Box::new(writer_executor_selector()))
        .with_evaluator(Box::new(HeuristicEvaluator::default()))
        .with_termination_speaker("CodeExecutor");
    chat.add_participant(AgentAdapter::new(
        Participant::new("CodeWriter", "Write code fragments."),
        writer_client,
    ))
    .unwrap();
    chat.add_participant(
        AgentAdapter::new(
            Participant::new("CodeExecutor", "Execute code fragments.").with_tool_invocation(),
            executor_client,
        )
        .with_tools(registry),
    )
    .unwrap();
    (chat, dir)
}

#[tokio::test]
async fn factorial_completes_within_two_iterations() {
    let (mut chat, _dir) = factorial_chat().await;
    let messages = chat.run("compute 5 factorial").await.unwrap();

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].author.as_deref(), Some("CodeWriter"));
    assert_eq!(messages[1].author.as_deref(), Some("CodeExecutor"));
    assert!(messages[1].content.contains("120"));
    assert!(chat.is_complete());
}

#[tokio::test]
async fn factorial_artifact_holds_the_executed_fragment() {
    let (mut chat, dir) = factorial_chat().await;
    chat.run("compute 5 factorial").await.unwrap();

    let artifact = std::fs::read_to_string(dir.path().join("generated_code.txt")).unwrap();
    assert_eq!(artifact, FACTORIAL_FRAGMENT);
}

#[tokio::test]
async fn iteration_cap_forces_completion() {
    let mut chat = GroupChat::new("capped")
        .with_selector(Box::new(writer_executor_selector()))
        .with_evaluator(Box::new(NeverComplete))
        .with_max_iterations(4);
    chat.add_participant(AgentAdapter::new(
        Participant::new("CodeWriter", "Write code."),
        Arc::new(MockClient::scripted(&[])),
    ))
    .unwrap();
    chat.add_participant(AgentAdapter::new(
        Participant::new("CodeExecutor", "Run code."),
        Arc::new(MockClient::scripted(&[])),
    ))
    .unwrap();

    let messages = chat.run("never finishes").await.unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(chat.state(), ChatState::Complete);
}

#[tokio::test]
async fn no_participant_speaks_twice_in_a_row() {
    let mut chat = GroupChat::new("alternating")
        // empty rule table, so every pick goes through the order fallback
        .with_selector(Box::new(RuleSelector::new()))
        .with_evaluator(Box::new(NeverComplete))
        .with_max_iterations(5);
    chat.add_participant(AgentAdapter::new(
        Participant::new("CodeWriter", "Write code."),
        Arc::new(MockClient::scripted(&[])),
    ))
    .unwrap();
    chat.add_participant(AgentAdapter::new(
        Participant::new("CodeExecutor", "Run code."),
        Arc::new(MockClient::scripted(&[])),
    ))
    .unwrap();

    let messages = chat.run("go").await.unwrap();
    for pair in messages.windows(2) {
        assert_ne!(pair[0].author, pair[1].author);
    }
}

#[tokio::test]
async fn provider_failure_aborts_and_keeps_history() {
    let mut chat = GroupChat::new("aborting")
        .with_selector(Box::new(writer_executor_selector()))
        .with_evaluator(Box::new(NeverComplete));
    chat.add_participant(AgentAdapter::new(
        Participant::new("CodeWriter", "Write code."),
        Arc::new(MockClient::scripted(&["result = 120"])),
    ))
    .unwrap();
    chat.add_participant(AgentAdapter::new(
        Participant::new("CodeExecutor", "Run code."),
        Arc::new(FailingClient),
    ))
    .unwrap();

    let err = chat.run("compute something").await.unwrap_err();
    match err {
        GroupChatError::TurnFailed { participant, .. } => {
            assert_eq!(participant, "CodeExecutor");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(chat.state(), ChatState::Aborted);
    // user message plus the writer turn that succeeded before the failure
    assert_eq!(chat.history().len(), 2);
}

#[tokio::test]
async fn reset_returns_to_idle_from_any_state() {
    let (mut chat, _dir) = factorial_chat().await;
    chat.run("compute 5 factorial").await.unwrap();
    assert_eq!(chat.state(), ChatState::Complete);

    chat.reset();
    assert_eq!(chat.state(), ChatState::Idle);
    assert!(chat.history().is_empty());

    let mut aborting = GroupChat::new("aborting").with_evaluator(Box::new(NeverComplete));
    aborting
        .add_participant(AgentAdapter::new(
            Participant::new("CodeWriter", "Write code."),
            Arc::new(FailingClient),
        ))
        .unwrap();
    aborting.run("go").await.unwrap_err();
    assert_eq!(aborting.state(), ChatState::Aborted);

    aborting.reset();
    assert_eq!(aborting.state(), ChatState::Idle);
    assert!(aborting.history().is_empty());
}

#[tokio::test]
async fn chat_is_reentrant_after_completion() {
    let mut chat = GroupChat::new("reentrant")
        .with_selector(Box::new(writer_executor_selector()))
        .with_evaluator(Box::new(HeuristicEvaluator::default()));
    chat.add_participant(AgentAdapter::new(
        Participant::new("CodeWriter", "Write code."),
        Arc::new(MockClient::scripted(&["x = 1", "y = 2"])),
    ))
    .unwrap();
    chat.add_participant(AgentAdapter::new(
        Participant::new("CodeExecutor", "Run code."),
        Arc::new(MockClient::scripted(&["all good", "all good again"])),
    ))
    .unwrap();

    chat.run("first task").await.unwrap();
    assert!(chat.is_complete());
    let after_first = chat.history().len();

    let messages = chat.run("second task").await.unwrap();
    assert!(!messages.is_empty());
    assert!(chat.history().len() > after_first);
    assert!(chat.is_complete());
}

#[tokio::test]
async fn duplicate_participant_names_are_rejected() {
    let mut chat = GroupChat::new("dup");
    chat.add_participant(AgentAdapter::new(
        Participant::new("CodeWriter", "Write code."),
        Arc::new(MockClient::scripted(&[])),
    ))
    .unwrap();
    let err = chat
        .add_participant(AgentAdapter::new(
            Participant::new("CodeWriter", "Another writer."),
            Arc::new(MockClient::scripted(&[])),
        ))
        .unwrap_err();
    match err {
        GroupChatError::DuplicateParticipant(name) => assert_eq!(name, "CodeWriter"),
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn invoking_an_empty_chat_fails() {
    let mut chat = GroupChat::new("empty");
    chat.add_user_message("hello");
    match chat.invoke().await.unwrap_err() {
        GroupChatError::NoParticipants => {}
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn history_ordering_is_total_and_append_only() {
    let (mut chat, _dir) = factorial_chat().await;
    chat.run("compute 5 factorial").await.unwrap();

    let ordinals: Vec<usize> = chat
        .history()
        .messages()
        .iter()
        .map(|m| m.ordinal)
        .collect();
    let expected: Vec<usize> = (0..chat.history().len()).collect();
    assert_eq!(ordinals, expected);
}
