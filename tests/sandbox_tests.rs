use codecrew::sandbox::{ExecutionOutcome, ExecutionProfile, SandboxExecutor, SandboxProtocol};
use codecrew::tool_protocol::ToolProtocol;

fn restricted(dir: &tempfile::TempDir) -> SandboxExecutor {
    SandboxExecutor::new(ExecutionProfile::Restricted)
        .with_artifact_path(dir.path().join("generated_code.txt"))
}

fn unrestricted(dir: &tempfile::TempDir) -> SandboxExecutor {
    SandboxExecutor::new(ExecutionProfile::Unrestricted)
        .with_artifact_path(dir.path().join("generated_code.txt"))
}

#[test]
fn simple_arithmetic_binds_result() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = restricted(&dir).execute("x = 2 + 2");

    match outcome {
        ExecutionOutcome::Success(bindings) => {
            assert_eq!(bindings.get("x").map(String::as_str), Some("4"));
        }
        ExecutionOutcome::Failure(msg) => panic!("unexpected failure: {}", msg),
    }
}

#[test]
fn assignment_chain_binds_every_name() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = restricted(&dir).execute("a = 3; b = a * 4; c = b - a");

    match outcome {
        ExecutionOutcome::Success(bindings) => {
            assert_eq!(bindings.get("a").map(String::as_str), Some("3"));
            assert_eq!(bindings.get("b").map(String::as_str), Some("12"));
            assert_eq!(bindings.get("c").map(String::as_str), Some("9"));
        }
        ExecutionOutcome::Failure(msg) => panic!("unexpected failure: {}", msg),
    }
}

#[test]
fn double_underscore_names_are_excluded() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = restricted(&dir).execute("__scratch = 5; total = __scratch + 1");

    match outcome {
        ExecutionOutcome::Success(bindings) => {
            assert_eq!(bindings.get("total").map(String::as_str), Some("6"));
            assert!(!bindings.contains_key("__scratch"));
        }
        ExecutionOutcome::Failure(msg) => panic!("unexpected failure: {}", msg),
    }
}

#[test]
fn syntax_error_is_contained() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = restricted(&dir).execute("x = (");
    assert!(!outcome.is_success());
}

#[test]
fn division_fault_is_contained() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = restricted(&dir).execute("x = 1 / 0");
    assert!(!outcome.is_success());
}

#[test]
fn restricted_profile_rejects_host_bindings() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = restricted(&dir).execute("contents = read_file(\"/etc/hostname\")");

    match outcome {
        ExecutionOutcome::Failure(msg) => assert!(msg.contains("read_file"), "got: {}", msg),
        ExecutionOutcome::Success(_) => panic!("restricted profile resolved read_file"),
    }
}

#[test]
fn restricted_profile_disables_builtins() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = restricted(&dir).execute("n = len(\"abc\")");
    assert!(!outcome.is_success());
}

#[test]
fn unrestricted_profile_enables_builtins() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = unrestricted(&dir).execute("n = len(\"abc\")");

    match outcome {
        ExecutionOutcome::Success(bindings) => {
            assert_eq!(bindings.get("n").map(String::as_str), Some("3"));
        }
        ExecutionOutcome::Failure(msg) => panic!("unexpected failure: {}", msg),
    }
}

#[test]
fn unrestricted_profile_reads_files() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data.txt");
    std::fs::write(&data, "42").unwrap();

    let fragment = format!("contents = read_file(\"{}\")", data.display());
    let outcome = unrestricted(&dir).execute(&fragment);

    match outcome {
        ExecutionOutcome::Success(bindings) => {
            assert!(bindings.get("contents").unwrap().contains("42"));
        }
        ExecutionOutcome::Failure(msg) => panic!("unexpected failure: {}", msg),
    }
}

#[test]
fn unrestricted_profile_writes_files() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("out.txt");

    let fragment = format!("write_file(\"{}\", \"hello\")", target.display());
    let outcome = unrestricted(&dir).execute(&fragment);

    assert!(outcome.is_success(), "got: {}", outcome);
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "hello");
}

#[test]
fn unrestricted_io_fault_is_contained() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = unrestricted(&dir).execute("contents = read_file(\"/no/such/path\")");

    match outcome {
        ExecutionOutcome::Failure(msg) => assert!(msg.contains("read_file"), "got: {}", msg),
        ExecutionOutcome::Success(_) => panic!("expected failure for missing file"),
    }
}

#[test]
fn artifact_reflects_the_latest_fragment() {
    let dir = tempfile::tempdir().unwrap();
    let executor = restricted(&dir);

    executor.execute("x = 1");
    executor.execute("y = 2");

    let artifact = std::fs::read_to_string(executor.artifact_path()).unwrap();
    assert_eq!(artifact, "y = 2");
}

#[test]
fn failure_display_carries_the_message() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = restricted(&dir).execute("x = (");
    assert!(outcome.to_string().starts_with("Error executing code:"));
}

#[tokio::test]
async fn protocol_exposes_execute_code() {
    let dir = tempfile::tempdir().unwrap();
    let protocol = SandboxProtocol::new(restricted(&dir));

    let tools = protocol.list_tools().await.unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "execute_code");

    let result = protocol
        .execute("execute_code", serde_json::json!({ "code": "x = 2 + 2" }))
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.output["bindings"]["x"], "4");
}

#[tokio::test]
async fn protocol_reports_fragment_faults_as_tool_failures() {
    let dir = tempfile::tempdir().unwrap();
    let protocol = SandboxProtocol::new(restricted(&dir));

    let result = protocol
        .execute("execute_code", serde_json::json!({ "code": "x = (" }))
        .await
        .unwrap();
    assert!(!result.success);
    assert!(result.error.is_some());
}

#[tokio::test]
async fn protocol_rejects_unknown_tools() {
    let dir = tempfile::tempdir().unwrap();
    let protocol = SandboxProtocol::new(restricted(&dir));

    let result = protocol
        .execute("delete_everything", serde_json::json!({}))
        .await
        .unwrap();
    assert!(!result.success);
}
