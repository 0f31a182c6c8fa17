//! A process-wide default engine.
//!
//! Small binaries often register everything from `main` and a few helper
//! modules. These functions forward to a lazily built [`Engine`] so those
//! helpers don't need an engine handle threaded through them. The library
//! itself never touches this engine.
//!
//! ```rust,no_run
//! use burrow::{global, CommandResult, CommandSpec, ContextSpec, FnCommand, RustylineEditor};
//!
//! global::register_context(ContextSpec::new("servers"));
//! global::register_command(FnCommand::new(
//!     CommandSpec::new("list").context("servers"),
//!     |rt, _| {
//!         rt.output().info("web-1");
//!         CommandResult::success()
//!     },
//! ));
//!
//! let mut editor = RustylineEditor::new(1000)?;
//! global::run(&mut editor)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::command::CommandFactory;
use crate::engine::{Engine, EngineBuilder, EngineError};
use crate::middleware::Middleware;
use crate::output::{OutputLevel, SharedWriter};
use crate::shell::LineEditor;
use crate::spec::ContextSpec;

static DEFAULT_ENGINE: Lazy<RwLock<Arc<Engine>>> = Lazy::new(|| RwLock::new(Arc::new(Engine::new())));

/// The current default engine.
pub fn default_engine() -> Arc<Engine> {
    Arc::clone(&DEFAULT_ENGINE.read())
}

/// Replaces the default engine with a freshly built one.
///
/// Handles returned earlier by [`default_engine`] keep the old engine.
pub fn reset_engine(builder: EngineBuilder) -> Arc<Engine> {
    let engine = Arc::new(builder.build());
    *DEFAULT_ENGINE.write() = Arc::clone(&engine);
    engine
}

pub fn register_context(spec: ContextSpec) {
    default_engine().register_context(spec);
}

/// # Panics
///
/// If the command spec has an empty name.
pub fn register_command<F: CommandFactory + 'static>(factory: F) {
    default_engine().register_command(factory);
}

pub fn use_middleware(middleware: Arc<dyn Middleware>) {
    default_engine().use_middleware(middleware);
}

pub fn set_prompt(prompt: impl Into<String>) {
    default_engine().set_prompt(prompt);
}

pub fn set_help_header(header: impl Into<String>) {
    default_engine().set_help_header(header);
}

pub fn set_output_level(level: OutputLevel) {
    default_engine().set_output_level(level);
}

pub fn set_output_writer(writer: SharedWriter) -> SharedWriter {
    default_engine().set_output_writer(writer)
}

/// Runs the default engine's loop.
pub fn run(editor: &mut dyn LineEditor) -> Result<(), EngineError> {
    default_engine().run(editor)
}
