//! Sandboxed execution of model-generated code fragments.
//!
//! Fragments are `;`-separated [`evalexpr`] assignment chains. Execution
//! happens inside an isolated evaluation context; the "result" of a fragment
//! is the set of top-level variable bindings it leaves behind, serialized
//! name → value-as-text. Every evaluation fault — syntax error, type error,
//! unresolved identifier, host I/O failure — is caught and converted into
//! [`ExecutionOutcome::Failure`]; the executor never panics and never
//! propagates a raw error to the caller.
//!
//! Two capability profiles:
//!
//! - [`ExecutionProfile::Restricted`] (default): built-in functions disabled
//!   and no host bindings registered. A fragment can only compute over the
//!   values it constructs itself.
//! - [`ExecutionProfile::Unrestricted`]: built-ins enabled plus host bindings
//!   for filesystem access and process environment. Explicitly unsafe; only
//!   for trusted operators who opt in.
//!
//! Each executed fragment is persisted to a transient temp file and mirrored
//! to a fixed-name artifact (overwritten on every call) so an operator can
//! always inspect the last thing that ran.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use evalexpr::{
    eval_with_context_mut, Context, ContextWithMutableFunctions, EvalexprError, Function,
    HashMapContext, IterateVariablesContext, Value,
};

use crate::tool_protocol::{
    ToolMetadata, ToolParameter, ToolParameterType, ToolProtocol, ToolResult,
};

/// Capability profile a [`SandboxExecutor`] runs fragments under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionProfile {
    /// No built-in functions, no host bindings. The default.
    Restricted,
    /// Built-ins plus filesystem and environment host bindings. Unsafe.
    Unrestricted,
}

/// Outcome of executing one fragment. Faults are data, not errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The fragment evaluated; these are the top-level bindings it created,
    /// name → value rendered as text, `__`-prefixed scratch names excluded.
    Success(BTreeMap<String, String>),
    /// The fragment faulted; the message describes what went wrong.
    Failure(String),
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success(_))
    }
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionOutcome::Success(bindings) => {
                let rendered: Vec<String> = bindings
                    .iter()
                    .map(|(name, value)| format!("{} = {}", name, value))
                    .collect();
                write!(f, "{{{}}}", rendered.join(", "))
            }
            ExecutionOutcome::Failure(message) => {
                write!(f, "Error executing code: {}", message)
            }
        }
    }
}

/// Evaluates untrusted code fragments under a fixed capability profile.
pub struct SandboxExecutor {
    profile: ExecutionProfile,
    artifact_path: PathBuf,
}

impl SandboxExecutor {
    /// An executor writing its fixed-name artifact to `generated_code.txt`
    /// in the working directory.
    pub fn new(profile: ExecutionProfile) -> Self {
        SandboxExecutor {
            profile,
            artifact_path: PathBuf::from("generated_code.txt"),
        }
    }

    /// Override where the fixed-name artifact is written.
    pub fn with_artifact_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact_path = path.into();
        self
    }

    pub fn profile(&self) -> ExecutionProfile {
        self.profile
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    /// Execute one fragment. Never panics; every fault comes back as
    /// [`ExecutionOutcome::Failure`].
    pub fn execute(&self, code: &str) -> ExecutionOutcome {
        if let Err(err) = self.persist_fragment(code) {
            return ExecutionOutcome::Failure(format!("could not persist fragment: {}", err));
        }

        let mut context = match self.build_context() {
            Ok(context) => context,
            Err(err) => return ExecutionOutcome::Failure(err.to_string()),
        };

        if let Err(err) = eval_with_context_mut(code, &mut context) {
            return ExecutionOutcome::Failure(err.to_string());
        }

        let mut bindings = BTreeMap::new();
        for (name, value) in context.iter_variables() {
            // double-underscore names are fragment-internal scratch space
            if name.starts_with("__") {
                continue;
            }
            bindings.insert(name, value.to_string());
        }
        ExecutionOutcome::Success(bindings)
    }

    /// Write the fragment to a transient temp file and mirror it to the
    /// fixed-name artifact.
    fn persist_fragment(&self, code: &str) -> Result<(), Box<dyn Error>> {
        let mut transient = tempfile::Builder::new()
            .prefix("fragment-")
            .suffix(".expr")
            .tempfile()?;
        transient.write_all(code.as_bytes())?;
        let (_, staged_path) = transient.keep()?;
        log::debug!("sandbox: fragment staged at {}", staged_path.display());

        fs::write(&self.artifact_path, code)?;
        Ok(())
    }

    fn build_context(&self) -> Result<HashMapContext, EvalexprError> {
        let mut context = HashMapContext::new();
        match self.profile {
            ExecutionProfile::Restricted => {
                context.set_builtin_functions_disabled(true)?;
            }
            ExecutionProfile::Unrestricted => {
                register_host_bindings(&mut context)?;
            }
        }
        Ok(context)
    }
}

/// Host bindings granted to unrestricted fragments: filesystem reads/writes,
/// directory listing, and process environment lookup. No network primitive
/// is registered.
fn register_host_bindings(context: &mut HashMapContext) -> Result<(), EvalexprError> {
    context.set_function(
        "read_file".to_string(),
        Function::new(|argument| {
            let path = argument.as_string()?;
            let contents = fs::read_to_string(&path)
                .map_err(|e| EvalexprError::CustomMessage(format!("read_file({}): {}", path, e)))?;
            Ok(Value::from(contents))
        }),
    )?;

    context.set_function(
        "write_file".to_string(),
        Function::new(|argument| {
            let args = argument.as_fixed_len_tuple(2)?;
            let path = args[0].as_string()?;
            let contents = args[1].as_string()?;
            fs::write(&path, contents)
                .map_err(|e| EvalexprError::CustomMessage(format!("write_file({}): {}", path, e)))?;
            Ok(Value::Empty)
        }),
    )?;

    context.set_function(
        "list_dir".to_string(),
        Function::new(|argument| {
            let path = argument.as_string()?;
            let entries = fs::read_dir(&path)
                .map_err(|e| EvalexprError::CustomMessage(format!("list_dir({}): {}", path, e)))?;
            let mut names = Vec::new();
            for entry in entries {
                let entry = entry
                    .map_err(|e| EvalexprError::CustomMessage(format!("list_dir({}): {}", path, e)))?;
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
            names.sort();
            Ok(Value::from(names.join("\n")))
        }),
    )?;

    context.set_function(
        "env".to_string(),
        Function::new(|argument| {
            let name = argument.as_string()?;
            let value = std::env::var(&name)
                .map_err(|e| EvalexprError::CustomMessage(format!("env({}): {}", name, e)))?;
            Ok(Value::from(value))
        }),
    )?;

    Ok(())
}

/// Exposes a [`SandboxExecutor`] as tool `execute_code` through
/// [`ToolProtocol`], for binding into a tool-capable participant's registry.
pub struct SandboxProtocol {
    executor: SandboxExecutor,
}

impl SandboxProtocol {
    pub fn new(executor: SandboxExecutor) -> Self {
        SandboxProtocol { executor }
    }
}

#[async_trait]
impl ToolProtocol for SandboxProtocol {
    async fn execute(
        &self,
        tool_name: &str,
        parameters: serde_json::Value,
    ) -> Result<ToolResult, Box<dyn Error + Send + Sync>> {
        if tool_name != "execute_code" {
            return Ok(ToolResult::failure(format!(
                "unknown tool '{}'",
                tool_name
            )));
        }
        let code = parameters
            .get("code")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        match self.executor.execute(code) {
            ExecutionOutcome::Success(bindings) => {
                Ok(ToolResult::success(serde_json::json!({ "bindings": bindings })))
            }
            ExecutionOutcome::Failure(message) => Ok(ToolResult::failure(message)),
        }
    }

    async fn list_tools(&self) -> Result<Vec<ToolMetadata>, Box<dyn Error + Send + Sync>> {
        Ok(vec![ToolMetadata::new(
            "execute_code",
            "Execute a code fragment in the sandbox and return the variable bindings it produces",
        )
        .with_parameter(
            ToolParameter::new("code", ToolParameterType::String)
                .with_description("Semicolon-separated assignment chain to evaluate")
                .required(),
        )])
    }

    fn protocol_name(&self) -> &str {
        "sandbox"
    }
}
