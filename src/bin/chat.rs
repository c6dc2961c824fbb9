//! Line-oriented group chat CLI pairing a code-writing participant with a
//! tool-capable code-executing participant.
//!
//! Commands:
//! - `exit` terminates the session
//! - `reset` clears the conversation
//! - `@<path>` reads the message body from a file
//! - anything else becomes a user message
//!
//! After each invocation the produced turns are written to the fixed-name
//! `execution_result.txt` in the working directory.
//!
//! Configuration comes from the `AZURE_OPENAI_*` environment variables; set
//! `CODECREW_UNRESTRICTED=1` to grant the sandbox its unrestricted profile.

use std::fs;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use codecrew::auth::{StaticTokenProvider, TokenCache};
use codecrew::{
    AgentAdapter, AzureOpenAIClient, ChatMessage, CodeCrewConfig, GenerationParams, GroupChat,
    HeuristicEvaluator, Participant, Role, RuleSelector, SandboxExecutor, SandboxProtocol,
    ToolRegistry,
};
use codecrew::sandbox::ExecutionProfile;

const CODE_WRITER: &str = "CodeWriter";
const CODE_EXECUTOR: &str = "CodeExecutor";
const RESULT_FILE: &str = "execution_result.txt";

const WRITER_INSTRUCTIONS: &str = "\
You write code fragments that solve the user's task.\n\
A fragment is a chain of assignments separated by semicolons, for example:\n\
result = 1; result = result * 2; result = result * 3\n\
Respond with the code fragment only. No explanation, no formatting, no \
backticks, and never execute anything yourself. Bind the final answer to a \
clearly named variable.";

const EXECUTOR_INSTRUCTIONS: &str = "\
You execute the most recent code fragment from the conversation using your \
execute_code tool, then report the resulting variable bindings to the user \
in plain language. If execution fails, describe the error and what should \
be fixed. Never write new code yourself.";

#[tokio::main]
async fn main() {
    codecrew::init_logger();

    let config = match CodeCrewConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let tokens = Arc::new(TokenCache::new(Arc::new(StaticTokenProvider::new(
        config.api_key.clone(),
    ))));
    let client = Arc::new(AzureOpenAIClient::new(&config, tokens));

    let profile = match std::env::var("CODECREW_UNRESTRICTED").as_deref() {
        Ok("1") | Ok("true") => ExecutionProfile::Unrestricted,
        _ => ExecutionProfile::Restricted,
    };
    let mut registry = ToolRegistry::empty();
    if let Err(e) = registry
        .add_protocol(Arc::new(SandboxProtocol::new(SandboxExecutor::new(profile))))
        .await
    {
        eprintln!("could not register sandbox tool: {}", e);
        std::process::exit(1);
    }

    let writer = Participant::new(CODE_WRITER, WRITER_INSTRUCTIONS)
        .with_params(GenerationParams::default().with_temperature(0.0).with_max_tokens(1000));
    let executor = Participant::new(CODE_EXECUTOR, EXECUTOR_INSTRUCTIONS)
        .with_tool_invocation()
        .with_params(GenerationParams::default().with_temperature(0.0).with_max_tokens(1000));

    let mut chat = GroupChat::new("code-crew")
        .with_selector(Box::new(
            RuleSelector::new()
                .with_rule(CODE_WRITER, CODE_EXECUTOR)
                .with_rule(CODE_EXECUTOR, CODE_WRITER),
        ))
        .with_evaluator(Box::new(HeuristicEvaluator::default()))
        .with_termination_speaker(CODE_EXECUTOR);

    if let Err(e) = chat.add_participant(AgentAdapter::new(writer, client.clone())) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
    if let Err(e) =
        chat.add_participant(AgentAdapter::new(executor, client.clone()).with_tools(registry))
    {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    println!("Ready. Type a request, 'reset' to start over, or 'exit' to quit.");
    println!("Prefix a path with '@' to send a file's contents as the message.");

    let stdin = io::stdin();
    loop {
        print!("User:> ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break, // EOF
            Ok(_) => {}
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") {
            break;
        }
        if input.eq_ignore_ascii_case("reset") {
            chat.reset();
            println!("[Conversation has been reset]");
            continue;
        }

        let body = if let Some(path) = input.strip_prefix('@') {
            let path = path.trim();
            match fs::read_to_string(path) {
                Ok(contents) => contents,
                Err(_) => {
                    println!("Unable to access file: {}", path);
                    continue;
                }
            }
        } else {
            input.to_string()
        };

        match chat.run(&body).await {
            Ok(messages) => {
                for message in &messages {
                    println!(
                        "# {} - {}: '{}'",
                        role_label(&message.role),
                        message.author.as_deref().unwrap_or("*"),
                        message.content
                    );
                }
                write_result_file(&messages);
            }
            Err(e) => {
                eprintln!("invocation failed: {}", e);
                if let Err(io_err) = fs::write(RESULT_FILE, format!("error: {}", e)) {
                    log::warn!("could not write {}: {}", RESULT_FILE, io_err);
                }
            }
        }
    }
}

fn role_label(role: &Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn write_result_file(messages: &[ChatMessage]) {
    let serialized: Vec<String> = messages
        .iter()
        .map(|m| {
            format!(
                "[{}] {}",
                m.author.as_deref().unwrap_or("user"),
                m.content
            )
        })
        .collect();
    if let Err(e) = fs::write(RESULT_FILE, serialized.join("\n")) {
        log::warn!("could not write {}: {}", RESULT_FILE, e);
    }
}
