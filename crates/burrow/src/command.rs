//! Command types.
//!
//! A command is registered as a [`CommandFactory`]: it declares a
//! [`CommandSpec`] and builds a fresh [`Command`] for every invocation. The
//! command receives the [`Runtime`] handle and a [`CommandInput`] with the
//! parsed values, and reports back through a [`CommandResult`].
//!
//! # Results
//!
//! A result carries an optional explicit [`CommandStatus`]. When none is set
//! the engine derives one: an attached [`CommandError`] means `Failed`,
//! otherwise `Success`. A failed result never triggers a context transition.
//!
//! ```rust
//! use burrow::{CommandResult, CommandStatus, CommandError};
//!
//! let ok = CommandResult::success().info("done");
//! assert_eq!(ok.resolved_status(), CommandStatus::Success);
//!
//! let bad = CommandResult::failed(CommandError::new("no such host").hint("try `list`"));
//! assert_eq!(bad.resolved_status(), CommandStatus::Failed);
//! ```
//!
//! # Closures
//!
//! Most commands need no per-invocation state. [`FnCommand`] turns a spec and
//! a closure into a factory:
//!
//! ```rust
//! use burrow::{CommandResult, CommandSpec, FnCommand};
//!
//! let hello = FnCommand::new(CommandSpec::new("hello"), |rt, _input| {
//!     rt.output().info("hello");
//!     CommandResult::success()
//! });
//! # let _ = hello;
//! ```

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::cancel::CancellationToken;
use crate::output::{OutputMessage, Severity};
use crate::runtime::Runtime;
use crate::spec::CommandSpec;
use crate::value::{Value, ValueSet};

/// A single invocation of a command.
pub trait Command {
    fn execute(&mut self, rt: &mut Runtime, input: &CommandInput) -> CommandResult;
}

/// Builds commands. One factory is registered per command name.
pub trait CommandFactory: Send + Sync {
    fn spec(&self) -> CommandSpec;

    /// Creates the command for one invocation. An error becomes a failed
    /// result; it never stops the shell.
    fn create(&self, rt: &Runtime) -> anyhow::Result<Box<dyn Command>>;
}

/// Registry entry: a spec and the factory that backs it.
///
/// Alias keys in the registry hold clones of the same entry.
#[derive(Clone)]
pub struct CommandEntry {
    pub spec: CommandSpec,
    pub factory: Arc<dyn CommandFactory>,
}

impl fmt::Debug for CommandEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandEntry")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

/// Parsed input for one invocation.
#[derive(Debug, Clone, Default)]
pub struct CommandInput {
    /// Tokens after the command name, as typed.
    pub raw: Vec<String>,
    pub args: ValueSet,
    pub flags: ValueSet,
    /// Payload of the context frame the command runs in.
    pub pipeline: Option<Value>,
    pub cancellation: CancellationToken,
}

/// Outcome category of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Success,
    Failed,
    Partial,
    Pending,
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandStatus::Success => "success",
            CommandStatus::Failed => "failed",
            CommandStatus::Partial => "partial",
            CommandStatus::Pending => "pending",
        };
        f.write_str(name)
    }
}

/// An error surfaced to the user, with presentation metadata.
#[derive(Debug, Default)]
pub struct CommandError {
    pub message: String,
    pub source: Option<anyhow::Error>,
    pub severity: Severity,
    pub hints: Vec<String>,
    pub recoverable: bool,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Error,
            ..Default::default()
        }
    }

    /// Wraps an underlying cause. Its text is shown when no message is set.
    pub fn from_source(source: impl Into<anyhow::Error>) -> Self {
        Self {
            source: Some(source.into()),
            severity: Severity::Error,
            ..Default::default()
        }
    }

    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = recoverable;
        self
    }

    /// The text shown to the user.
    pub fn display_message(&self) -> String {
        if !self.message.is_empty() {
            return self.message.clone();
        }
        match &self.source {
            Some(source) => source.to_string(),
            None => "command failed".to_string(),
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_message())
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| &**e as &(dyn std::error::Error + 'static))
    }
}

impl From<anyhow::Error> for CommandError {
    fn from(source: anyhow::Error) -> Self {
        Self::from_source(source)
    }
}

impl From<&str> for CommandError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for CommandError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// What a command hands back to the engine.
#[derive(Debug, Default)]
pub struct CommandResult {
    pub status: Option<CommandStatus>,
    pub error: Option<CommandError>,
    pub payload: Option<Value>,
    pub messages: Vec<OutputMessage>,
    /// Context to navigate to after a non-failed run.
    pub next_context: Option<String>,
    /// Data forwarded to the next active frame when the command allows it.
    pub pipeline: Option<Value>,
}

impl CommandResult {
    pub fn success() -> Self {
        Self {
            status: Some(CommandStatus::Success),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<CommandError>) -> Self {
        Self {
            status: Some(CommandStatus::Failed),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: CommandStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_error(mut self, error: impl Into<CommandError>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn message(mut self, message: OutputMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn info(self, content: impl Into<String>) -> Self {
        self.message(OutputMessage::info(content))
    }

    pub fn warning(self, content: impl Into<String>) -> Self {
        self.message(OutputMessage::warning(content))
    }

    pub fn navigate(mut self, context: impl Into<String>) -> Self {
        self.next_context = Some(context.into());
        self
    }

    pub fn pipeline(mut self, data: impl Into<Value>) -> Self {
        self.pipeline = Some(data.into());
        self
    }

    /// Explicit status if set, otherwise derived from the error.
    pub fn resolved_status(&self) -> CommandStatus {
        match (self.status, &self.error) {
            (Some(status), _) => status,
            (None, Some(_)) => CommandStatus::Failed,
            (None, None) => CommandStatus::Success,
        }
    }
}

impl From<anyhow::Result<CommandResult>> for CommandResult {
    fn from(result: anyhow::Result<CommandResult>) -> Self {
        result.unwrap_or_else(CommandResult::failed)
    }
}

type CommandFn = dyn Fn(&mut Runtime, &CommandInput) -> CommandResult + Send + Sync;

/// A factory backed by a closure. Every invocation shares the closure.
pub struct FnCommand {
    spec: CommandSpec,
    f: Arc<CommandFn>,
}

impl FnCommand {
    pub fn new<F>(spec: CommandSpec, f: F) -> Self
    where
        F: Fn(&mut Runtime, &CommandInput) -> CommandResult + Send + Sync + 'static,
    {
        Self {
            spec,
            f: Arc::new(f),
        }
    }
}

impl fmt::Debug for FnCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCommand")
            .field("spec", &self.spec.name)
            .finish_non_exhaustive()
    }
}

struct FnInvocation(Arc<CommandFn>);

impl Command for FnInvocation {
    fn execute(&mut self, rt: &mut Runtime, input: &CommandInput) -> CommandResult {
        (self.0)(rt, input)
    }
}

impl CommandFactory for FnCommand {
    fn spec(&self) -> CommandSpec {
        self.spec.clone()
    }

    fn create(&self, _rt: &Runtime) -> anyhow::Result<Box<dyn Command>> {
        Ok(Box::new(FnInvocation(Arc::clone(&self.f))))
    }
}
