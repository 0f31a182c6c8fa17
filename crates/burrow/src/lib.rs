//! Context-aware interactive command shells.
//!
//! `burrow` is the plumbing behind an operator shell: a registry of named
//! contexts and the commands that live in them, a navigation stack the user
//! moves through (`servers`, `..`, `/`), a typed argument parser driven by
//! declarative specs, and an interceptor chain wrapped around every
//! invocation.
//!
//! # Features
//!
//! - **Contexts**: named scopes with aliases, custom prompts and a payload
//!   that flows into the commands run inside them
//! - **Typed parsing**: positional arguments and flags cast to string, int,
//!   float, bool, duration, JSON or enum values before a command runs
//! - **Middleware**: `Recovery` and `Timing` ship built-in; closures plug in
//!   through [`middleware::from_fn`]
//! - **Collaborators**: session store, typed service registry, background
//!   task supervisor and cancellation scopes reachable from [`Runtime`]
//! - **Extensions**: staged, all-or-nothing registration bundles
//!
//! # Quick start
//!
//! ```rust
//! use burrow::{
//!     ArgKind, ArgSpec, CaptureBuffer, CommandResult, CommandSpec, ContextSpec, Engine,
//!     FnCommand, ScriptedLines,
//! };
//!
//! let out = CaptureBuffer::new();
//! let engine = Engine::builder().output_writer(out.writer()).build();
//!
//! engine.register_context(ContextSpec::new("servers").alias("srv"));
//! engine.register_command(FnCommand::new(
//!     CommandSpec::new("show")
//!         .context("servers")
//!         .arg(ArgSpec::new("name", ArgKind::String).required()),
//!     |rt, input| {
//!         rt.output().info(format!("server {}", input.args.string("name")));
//!         CommandResult::success()
//!     },
//! ));
//!
//! engine.run(&mut ScriptedLines::new(["srv", "show web-1"])).unwrap();
//! assert_eq!(out.contents(), "server web-1\n");
//! ```
//!
//! # Logging
//!
//! The crate emits `tracing` events only. Call [`init_logging`] (or install
//! your own subscriber) to see them; [`LOG_ENV`] overrides the filter.

mod args;
mod cancel;
mod command;
mod config;
mod context;
mod duration;
mod engine;
mod extension;
pub mod global;
mod help;
mod logging;
pub mod middleware;
mod output;
mod registry;
mod runtime;
mod session;
mod shell;
mod spec;
mod tasks;
mod value;

pub use args::{cast_value, ArgsParser, ParseError, Parsed};
pub use cancel::{CancellationToken, Cancelled, DropGuard};
pub use command::{
    Command, CommandEntry, CommandError, CommandFactory, CommandInput, CommandResult,
    CommandStatus, FnCommand,
};
pub use config::{ConfigError, LogFormat, LoggingConfig, ShellConfig};
pub use context::{ContextError, ContextManager, ExecutionContext};
pub use duration::{format_duration, parse_duration, DurationError};
pub use engine::{Engine, EngineBuilder, EngineError, Flow};
pub use extension::{
    Extension, ExtensionError, ExtensionReport, FnExtension, RegistryWriter,
    EXTENSION_API_VERSION,
};
pub use logging::{init_logging, LOG_ENV};
pub use middleware::{install_panic_hook, Middleware, Next, Recovery, Timing};
pub use output::{
    CaptureBuffer, OutputChannel, OutputLevel, OutputMessage, ParseLevelError, Severity,
    SharedWriter,
};
pub use registry::CommandRegistry;
pub use runtime::{NavigationRequest, Runtime};
pub use session::{ServiceRegistry, SessionStore};
pub use shell::{
    CompletionItem, CompletionTree, LineEditor, LineEditorError, ReadOutcome, RustylineEditor,
    ScriptedLines,
};
pub use spec::{format_usage, ArgKind, ArgSpec, CommandSpec, ContextSpec, Example, FlagSpec};
pub use tasks::{TaskHandle, TaskManager, TaskOptions, TaskStatus};
pub use value::{parse_bool, Value, ValueError, ValueSet};
