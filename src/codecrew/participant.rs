//! Participant definitions: who is in the chat and what they are allowed to
//! do.

use crate::client_wrapper::GenerationParams;

/// What a participant is permitted to do during its turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CapabilitySet {
    /// Plain conversation only.
    ChatOnly,
    /// Conversation plus tool invocation through the adapter's registry.
    ToolInvocation,
}

/// A named member of a group chat.
///
/// Participants are immutable after construction; identity, instructions and
/// capabilities are fixed for the lifetime of the chat.
///
/// ```rust
/// use codecrew::{CapabilitySet, GenerationParams, Participant};
///
/// let writer = Participant::new("CodeWriter", "Write code to solve the task.")
///     .with_params(GenerationParams::default().with_temperature(0.0));
/// assert_eq!(writer.capability, CapabilitySet::ChatOnly);
///
/// let executor = Participant::new("CodeExecutor", "Run the code you are given.")
///     .with_tool_invocation();
/// assert_eq!(executor.capability, CapabilitySet::ToolInvocation);
/// ```
#[derive(Clone, Debug)]
pub struct Participant {
    /// Stable unique name; also the identity used by selectors and the
    /// no-consecutive-turns check.
    pub name: String,
    /// System-prompt instructions defining the participant's behavior.
    pub instructions: String,
    /// What the participant may do on its turn.
    pub capability: CapabilitySet,
    /// Generation knobs applied to every provider call made on this
    /// participant's behalf.
    pub params: GenerationParams,
}

impl Participant {
    /// A chat-only participant with default generation parameters.
    pub fn new(name: &str, instructions: &str) -> Self {
        Participant {
            name: name.to_string(),
            instructions: instructions.to_string(),
            capability: CapabilitySet::ChatOnly,
            params: GenerationParams::default(),
        }
    }

    /// Grant the participant tool invocation on its turns.
    pub fn with_tool_invocation(mut self) -> Self {
        self.capability = CapabilitySet::ToolInvocation;
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }
}
