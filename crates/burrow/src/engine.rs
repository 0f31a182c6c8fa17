//! The dispatch engine.
//!
//! [`Engine`] ties the registry, the navigation stack, the parser and the
//! middleware chain together. One input line is handled as follows:
//!
//! ```text
//! line → tokens
//!   → built-in verb?            (help, contexts, ctx, back, /, history, exit)
//!   → bare context name?        (root only; same as `ctx goto <name>`)
//!   → registry.resolve(current context, first token)
//!   → ArgsParser::parse(rest, spec)
//!   → middleware chain → factory.create → Command::execute
//!   → messages and errors rendered
//!   → context transition unless the result failed
//! ```
//!
//! Built-ins always win over commands of the same name, and bare context
//! entry wins over root commands. Every error is terminal for its line only;
//! [`Engine::run`] keeps reading until an exit verb or end of input.
//!
//! # Example
//!
//! ```rust
//! use burrow::{
//!     CaptureBuffer, CommandResult, CommandSpec, ContextSpec, Engine, FnCommand, ScriptedLines,
//! };
//!
//! let buf = CaptureBuffer::new();
//! let engine = Engine::builder().output_writer(buf.writer()).build();
//! engine.register_context(ContextSpec::new("servers").alias("srv"));
//! engine.register_command(FnCommand::new(
//!     CommandSpec::new("list").context("servers"),
//!     |rt, _| {
//!         rt.output().info("web-1");
//!         CommandResult::success()
//!     },
//! ));
//!
//! let mut lines = ScriptedLines::new(["srv", "list", "/"]);
//! engine.run(&mut lines).unwrap();
//!
//! assert_eq!(buf.contents(), "web-1\n");
//! assert_eq!(lines.prompts(), &["> ", "> servers> ", "> servers> ", "> "]);
//! ```

use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::args::{ArgsParser, ParseError};
use crate::cancel::CancellationToken;
use crate::command::{CommandEntry, CommandFactory, CommandInput, CommandResult, CommandStatus, FnCommand};
use crate::config::ShellConfig;
use crate::context::{ContextError, ContextManager};
use crate::extension::{Extension, ExtensionReport};
use crate::help;
use crate::middleware::{self, Middleware, Next, Recovery, Timing};
use crate::output::{OutputChannel, OutputLevel, SharedWriter};
use crate::registry::CommandRegistry;
use crate::runtime::{NavigationRequest, Runtime};
use crate::session::{ServiceRegistry, SessionStore};
use crate::shell::{CompletionItem, CompletionTree, LineEditor, LineEditorError, ReadOutcome};
use crate::spec::{CommandSpec, ContextSpec};
use crate::value::Value;

/// Errors reported for a single input line.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("ctx command requires arguments")]
    CtxMissingAction,

    #[error("usage: ctx {0} <name>")]
    CtxUsage(&'static str),

    #[error("unknown ctx action: {0}")]
    UnknownCtxAction(String),

    #[error(transparent)]
    LineEditor(#[from] LineEditorError),
}

/// What the caller should do after a line has been processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
    /// The line asked for history, which only the line editor knows.
    ShowHistory,
}

const EXIT_VERBS: [&str; 3] = ["exit", "quit", "q"];

#[derive(Debug, Clone)]
struct Settings {
    prompt_base: String,
    help_header: String,
}

/// A context-aware command shell.
pub struct Engine {
    registry: Arc<CommandRegistry>,
    contexts: Arc<ContextManager>,
    session: Arc<SessionStore>,
    services: Arc<ServiceRegistry>,
    tasks: Arc<crate::tasks::TaskManager>,
    output: OutputChannel,
    parser: ArgsParser,
    middleware: RwLock<Vec<Arc<dyn Middleware>>>,
    settings: Arc<RwLock<Settings>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("context", &self.contexts.current_name())
            .field("middleware", &self.middleware.read().len())
            .field("settings", &*self.settings.read())
            .finish_non_exhaustive()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// An engine with default settings and the recovery middleware.
    pub fn new() -> Self {
        EngineBuilder::new().build()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    pub fn contexts(&self) -> &Arc<ContextManager> {
        &self.contexts
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn services(&self) -> &Arc<ServiceRegistry> {
        &self.services
    }

    pub fn tasks(&self) -> &Arc<crate::tasks::TaskManager> {
        &self.tasks
    }

    pub fn output(&self) -> &OutputChannel {
        &self.output
    }

    pub fn register_context(&self, spec: ContextSpec) {
        self.registry.register_context(spec);
    }

    /// # Panics
    ///
    /// If the command spec has an empty name.
    pub fn register_command<F: CommandFactory + 'static>(&self, factory: F) {
        self.registry.register_command(factory);
    }

    pub fn load_extensions<'a, I>(&self, extensions: I) -> ExtensionReport
    where
        I: IntoIterator<Item = &'a dyn Extension>,
    {
        self.registry.load_extensions(extensions)
    }

    /// Appends a middleware. It runs inside every middleware added before it.
    pub fn use_middleware(&self, middleware: Arc<dyn Middleware>) {
        self.middleware.write().push(middleware);
    }

    /// Ignored when empty.
    pub fn set_prompt(&self, prompt: impl Into<String>) {
        let prompt = prompt.into();
        if !prompt.is_empty() {
            self.settings.write().prompt_base = prompt;
        }
    }

    /// Ignored when empty.
    pub fn set_help_header(&self, header: impl Into<String>) {
        let header = header.into();
        if !header.is_empty() {
            self.settings.write().help_header = header;
        }
    }

    pub fn set_output_level(&self, level: OutputLevel) {
        self.output.set_level(level);
    }

    /// Swaps the writer used by commands, built-ins and tasks, returning the
    /// previous one.
    pub fn set_output_writer(&self, writer: SharedWriter) -> SharedWriter {
        self.output.replace_writer(writer)
    }

    /// The prompt for the current context.
    pub fn prompt(&self) -> String {
        let base = self.settings.read().prompt_base.clone();
        self.contexts.prompt(&base)
    }

    /// Completion candidates for the current context.
    ///
    /// At root: every visible context with its commands, then root commands.
    /// Inside a context: that context's commands.
    pub fn completion_tree(&self) -> CompletionTree {
        let current = self.contexts.current_name();
        let names = |context: &str| -> Vec<String> {
            self.registry
                .commands(context, false)
                .into_iter()
                .map(|spec| spec.name)
                .collect()
        };

        if !current.is_empty() {
            return CompletionTree {
                items: names(&current).into_iter().map(CompletionItem::leaf).collect(),
            };
        }

        let mut items: Vec<CompletionItem> = self
            .registry
            .contexts(false)
            .into_iter()
            .map(|ctx| CompletionItem {
                children: names(&ctx.name),
                name: ctx.name,
            })
            .collect();
        items.extend(names("").into_iter().map(CompletionItem::leaf));
        CompletionTree { items }
    }

    /// Handles one input line.
    pub fn process_line(&self, line: &str) -> Result<Flow, EngineError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some((&head, rest)) = tokens.split_first() else {
            return Ok(Flow::Continue);
        };
        let current = self.contexts.current_name();
        debug!(context = %current, line, "processing line");

        match head {
            "help" | "?" | "h" | "ls" => {
                self.show_help(&current, rest.first().copied())?;
                return Ok(Flow::Continue);
            }
            "contexts" => {
                help::list_contexts(&self.output, &self.registry);
                return Ok(Flow::Continue);
            }
            "ctx" => {
                self.handle_ctx(rest)?;
                return Ok(Flow::Continue);
            }
            "back" | ".." => {
                self.contexts.pop()?;
                return Ok(Flow::Continue);
            }
            "/" => {
                self.contexts.pop_to_root();
                return Ok(Flow::Continue);
            }
            "history" => return Ok(Flow::ShowHistory),
            verb if EXIT_VERBS.contains(&verb) => return Ok(Flow::Exit),
            _ => {}
        }

        if current.is_empty() {
            if let Some(spec) = self.registry.context(head).filter(|spec| !spec.is_root()) {
                self.contexts.navigate(&spec.name, None)?;
                return Ok(Flow::Continue);
            }
        }

        let entry = self
            .registry
            .resolve(&current, head)
            .ok_or_else(|| EngineError::UnknownCommand(head.to_string()))?;
        self.invoke(&entry, rest)?;
        Ok(Flow::Continue)
    }

    fn show_help(&self, current: &str, topic: Option<&str>) -> Result<(), EngineError> {
        match topic {
            Some(name) => {
                let entry = self
                    .registry
                    .resolve(current, name)
                    .ok_or_else(|| EngineError::UnknownCommand(name.to_string()))?;
                help::render_command_help(&self.output, &entry.spec);
            }
            None => {
                let header = self.settings.read().help_header.clone();
                help::render_help(&self.output, &self.registry, current, &header);
            }
        }
        Ok(())
    }

    fn handle_ctx(&self, args: &[&str]) -> Result<(), EngineError> {
        match args {
            [] => Err(EngineError::CtxMissingAction),
            ["goto"] => Err(EngineError::CtxUsage("goto")),
            ["goto", name, ..] => Ok(self.contexts.navigate(name, None)?),
            ["push"] => Err(EngineError::CtxUsage("push")),
            ["push", name, ..] => Ok(self.contexts.push(name, None)?),
            ["pop", ..] => Ok(self.contexts.pop()?),
            [other, ..] => Err(EngineError::UnknownCtxAction(other.to_string())),
        }
    }

    fn invoke(&self, entry: &CommandEntry, raw: &[&str]) -> Result<(), EngineError> {
        let (args, flags) = self.parser.parse(raw, &entry.spec)?;
        debug!(command = %entry.spec.name, context = %entry.spec.context, "invoking command");

        let frame = self.contexts.current();
        let token = match entry.spec.timeout {
            Some(timeout) => CancellationToken::with_timeout(timeout),
            None => CancellationToken::new(),
        };
        let _release = token.drop_guard();

        let mut rt = Runtime::new(
            Arc::clone(&self.session),
            Arc::clone(&self.services),
            self.output.clone(),
            Arc::clone(&self.contexts),
            Arc::clone(&self.tasks),
            token.clone(),
            frame.payload.clone(),
        );
        let input = CommandInput {
            raw: raw.iter().map(|s| s.to_string()).collect(),
            args,
            flags,
            pipeline: frame.payload,
            cancellation: token,
        };

        let chain = self.middleware.read().clone();
        let mut result = Next::new(&chain, entry).run(&mut rt, &input);
        let status = result.resolved_status();

        self.output.aggregate_messages(&result.messages);
        if let Some(error) = &result.error {
            self.output.error(error.display_message());
            for hint in &error.hints {
                self.output.info(format!("hint: {}", hint));
            }
        }

        if status == CommandStatus::Failed {
            warn!(command = %entry.spec.name, "command failed");
            return Ok(());
        }

        let forwarded = if entry.spec.allows_pipeline {
            result.pipeline.clone().or_else(|| rt.take_changed_pipeline())
        } else {
            None
        };

        let navigation = rt.take_navigation().or_else(|| {
            result.next_context.take().map(|context| NavigationRequest {
                context,
                payload: result.pipeline.take(),
            })
        });

        if let Some(request) = navigation {
            if let Err(e) = self.contexts.navigate(&request.context, request.payload) {
                warn!(command = %entry.spec.name, error = %e, "navigation failed");
                self.output.error(e.to_string());
                return Ok(());
            }
            info!(context = %request.context, "context changed by command");
        }

        if let Some(data) = forwarded {
            self.contexts.set_current_payload(Some(data));
        }
        Ok(())
    }

    /// Runs the interactive loop until an exit verb or end of input.
    pub fn run(&self, editor: &mut dyn LineEditor) -> Result<(), EngineError> {
        loop {
            editor.set_completions(self.completion_tree());
            let prompt = self.prompt();

            let line = match editor.read_line(&prompt)? {
                ReadOutcome::Line(line) => line,
                ReadOutcome::Interrupted | ReadOutcome::Eof => return Ok(()),
            };
            let line = line.trim();
            let Some(first) = line.split_whitespace().next() else {
                continue;
            };

            if EXIT_VERBS.contains(&first) {
                self.output.info("Shutting down.");
                return Ok(());
            }

            if let Err(e) = editor.add_history(line) {
                self.output.info(format!("Error saving history: {}", e));
            }

            match self.process_line(line) {
                Ok(Flow::ShowHistory) => self.show_history(editor),
                Ok(Flow::Exit) => {
                    self.output.info("Shutting down.");
                    return Ok(());
                }
                Ok(Flow::Continue) => {}
                Err(e) => {
                    debug!(error = %e, "line failed");
                    self.output.info(format!("Error: {}", e));
                }
            }
        }
    }

    fn show_history(&self, editor: &dyn LineEditor) {
        let history = editor.history();
        if history.is_empty() {
            self.output.info("No history yet.");
            return;
        }
        for (i, line) in history.iter().enumerate() {
            self.output.info(format!("{:>4}  {}", i + 1, line));
        }
    }
}

/// Programmatic engine configuration.
///
/// ```rust
/// use burrow::{CaptureBuffer, Engine, OutputLevel};
///
/// let buf = CaptureBuffer::new();
/// let engine = Engine::builder()
///     .prompt("ops> ")
///     .help_header("Commands:")
///     .output_level(OutputLevel::Verbose)
///     .output_writer(buf.writer())
///     .services(|services| services.register("region", "eu-west-1".to_string()))
///     .build();
///
/// assert_eq!(engine.prompt(), "ops> ");
/// assert!(engine.services().contains("region"));
/// ```
pub struct EngineBuilder {
    prompt: String,
    help_header: String,
    output_level: OutputLevel,
    writer: Option<SharedWriter>,
    middleware: Vec<Arc<dyn Middleware>>,
    seeds: Vec<Box<dyn FnOnce(&ServiceRegistry)>>,
    recovery: bool,
    timing: bool,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("prompt", &self.prompt)
            .field("help_header", &self.help_header)
            .field("output_level", &self.output_level)
            .field("middleware", &self.middleware.len())
            .field("recovery", &self.recovery)
            .field("timing", &self.timing)
            .finish_non_exhaustive()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            prompt: "> ".to_string(),
            help_header: "Available commands:".to_string(),
            output_level: OutputLevel::Normal,
            writer: None,
            middleware: Vec::new(),
            seeds: Vec::new(),
            recovery: true,
            timing: false,
        }
    }

    /// Applies the engine-related fields of a loaded config.
    pub fn from_config(config: &ShellConfig) -> Self {
        Self::new()
            .prompt(config.prompt.clone())
            .help_header(config.help_header.clone())
            .output_level(config.output_level)
            .timing(config.timing)
    }

    /// Base prompt shown at root. Ignored when empty.
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        if !prompt.is_empty() {
            self.prompt = prompt;
        }
        self
    }

    /// Ignored when empty.
    pub fn help_header(mut self, header: impl Into<String>) -> Self {
        let header = header.into();
        if !header.is_empty() {
            self.help_header = header;
        }
        self
    }

    pub fn output_level(mut self, level: OutputLevel) -> Self {
        self.output_level = level;
        self
    }

    /// Defaults to stdout.
    pub fn output_writer(mut self, writer: SharedWriter) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn middleware_fn<F>(self, f: F) -> Self
    where
        F: for<'a> Fn(&mut Runtime, &CommandInput, &CommandEntry, Next<'a>) -> CommandResult
            + Send
            + Sync
            + 'static,
    {
        self.middleware(Arc::new(middleware::from_fn(f)))
    }

    /// Seeds the service registry once the engine is built.
    pub fn services<F: FnOnce(&ServiceRegistry) + 'static>(mut self, seed: F) -> Self {
        self.seeds.push(Box::new(seed));
        self
    }

    /// Installs the timing middleware inside recovery.
    pub fn timing(mut self, enabled: bool) -> Self {
        self.timing = enabled;
        self
    }

    /// Leaves panics in commands uncaught.
    pub fn without_recovery(mut self) -> Self {
        self.recovery = false;
        self
    }

    pub fn build(self) -> Engine {
        let output = match self.writer {
            Some(writer) => OutputChannel::new(writer),
            None => OutputChannel::stdout(),
        };
        output.set_level(self.output_level);

        let registry = Arc::new(CommandRegistry::new());
        let contexts = Arc::new(ContextManager::new(Arc::clone(&registry)));
        let services = Arc::new(ServiceRegistry::new());
        for seed in self.seeds {
            seed(&services);
        }

        let mut chain: Vec<Arc<dyn Middleware>> = Vec::new();
        if self.recovery {
            chain.push(Arc::new(Recovery));
        }
        if self.timing {
            chain.push(Arc::new(Timing));
        }
        chain.extend(self.middleware);

        let settings = Arc::new(RwLock::new(Settings {
            prompt_base: self.prompt,
            help_header: self.help_header,
        }));

        let engine = Engine {
            tasks: Arc::new(crate::tasks::TaskManager::new(output.clone())),
            registry,
            contexts,
            session: Arc::new(SessionStore::new()),
            services,
            output,
            parser: ArgsParser::new(),
            middleware: RwLock::new(chain),
            settings,
        };
        engine.register_builtins();
        engine
    }
}

impl Engine {
    fn register_builtins(&self) {
        let registry = Arc::downgrade(&self.registry);
        let settings = Arc::clone(&self.settings);
        self.register_command(FnCommand::new(
            CommandSpec::new("help")
                .alias("?")
                .alias("h")
                .summary("Show help for commands and contexts"),
            move |rt, _| {
                let Some(registry) = registry.upgrade() else {
                    return CommandResult::failed("registry is gone");
                };
                let header = settings.read().help_header.clone();
                let current = rt.contexts().current_name();
                help::render_help(rt.output(), &registry, &current, &header);
                CommandResult::success()
            },
        ));

        self.register_command(FnCommand::new(
            CommandSpec::new("tasks").summary("List background tasks"),
            |rt, _| {
                let tasks = rt.tasks().tasks();
                let rows: Vec<Vec<String>> = tasks
                    .iter()
                    .map(|t| {
                        vec![
                            t.id.clone(),
                            t.name.clone(),
                            t.status.to_string(),
                            t.error.clone().unwrap_or_default(),
                        ]
                    })
                    .collect();
                rt.output().write_table(&["ID", "Name", "Status", "Error"], &rows);
                CommandResult::success().with_payload(Value::Int(tasks.len() as i64))
            },
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::CaptureBuffer;
    use crate::shell::ScriptedLines;
    use crate::spec::{ArgKind, FlagSpec};

    fn engine() -> (Engine, CaptureBuffer) {
        let buf = CaptureBuffer::new();
        let engine = Engine::builder().output_writer(buf.writer()).build();
        engine.register_context(ContextSpec::new("servers").alias("srv").description("Manage servers"));
        engine.register_command(FnCommand::new(
            CommandSpec::new("list").context("servers").summary("List servers"),
            |rt, _| {
                rt.output().info("web-1");
                CommandResult::success()
            },
        ));
        (engine, buf)
    }

    #[test]
    fn test_builtins_registered() {
        let (engine, _) = engine();
        assert!(engine.registry().resolve("", "help").is_some());
        assert!(engine.registry().resolve("", "?").is_some());
        assert!(engine.registry().resolve("", "tasks").is_some());
    }

    #[test]
    fn test_empty_line_is_noop() {
        let (engine, buf) = engine();
        assert_eq!(engine.process_line("   ").unwrap(), Flow::Continue);
        assert_eq!(buf.contents(), "");
    }

    #[test]
    fn test_bare_context_entry_only_at_root() {
        let (engine, _) = engine();
        engine.register_context(ContextSpec::new("detail"));
        engine.process_line("srv").unwrap();
        assert_eq!(engine.contexts().current_name(), "servers");

        let err = engine.process_line("detail").unwrap_err();
        assert!(matches!(err, EngineError::UnknownCommand(_)));
        assert_eq!(engine.contexts().current_name(), "servers");
    }

    #[test]
    fn test_context_entry_beats_root_command() {
        let (engine, buf) = engine();
        engine.register_command(FnCommand::new(CommandSpec::new("servers"), |rt, _| {
            rt.output().info("shadowed");
            CommandResult::success()
        }));
        engine.process_line("servers").unwrap();
        assert_eq!(engine.contexts().current_name(), "servers");
        assert_eq!(buf.contents(), "");
    }

    #[test]
    fn test_builtin_beats_command() {
        let (engine, buf) = engine();
        engine.register_command(FnCommand::new(CommandSpec::new("contexts"), |rt, _| {
            rt.output().info("shadowed");
            CommandResult::success()
        }));
        engine.process_line("contexts").unwrap();
        assert_eq!(
            buf.contents(),
            "Contexts:\n  servers         Manage servers\n"
        );
    }

    #[test]
    fn test_ctx_verbs() {
        let (engine, _) = engine();
        assert!(matches!(
            engine.process_line("ctx"),
            Err(EngineError::CtxMissingAction)
        ));
        assert_eq!(
            engine.process_line("ctx goto").unwrap_err().to_string(),
            "usage: ctx goto <name>"
        );
        assert_eq!(
            engine.process_line("ctx jump x").unwrap_err().to_string(),
            "unknown ctx action: jump"
        );

        engine.process_line("ctx push servers").unwrap();
        engine.process_line("ctx push srv").unwrap();
        assert_eq!(engine.contexts().depth(), 3);
        engine.process_line("ctx pop").unwrap();
        engine.process_line("..").unwrap();
        assert_eq!(engine.contexts().depth(), 1);
        assert!(matches!(
            engine.process_line("back"),
            Err(EngineError::Context(ContextError::AtRoot))
        ));
    }

    #[test]
    fn test_flow_verbs() {
        let (engine, _) = engine();
        assert_eq!(engine.process_line("history").unwrap(), Flow::ShowHistory);
        assert_eq!(engine.process_line("quit").unwrap(), Flow::Exit);
    }

    #[test]
    fn test_failed_result_renders_error_and_hints() {
        let (engine, buf) = engine();
        engine.register_command(FnCommand::new(CommandSpec::new("fail"), |_, _| {
            CommandResult::failed(crate::CommandError::new("nope").hint("try again"))
                .warning("careful")
                .navigate("servers")
        }));
        engine.process_line("fail").unwrap();
        assert_eq!(buf.contents(), "WARNING: careful\nERROR: nope\nhint: try again\n");
        assert_eq!(engine.contexts().current_name(), "");
    }

    #[test]
    fn test_runtime_navigation_wins() {
        let (engine, _) = engine();
        engine.register_context(ContextSpec::new("other"));
        engine.register_command(FnCommand::new(CommandSpec::new("go"), |rt, _| {
            rt.navigate_to("other", Some(Value::from("from-rt")));
            CommandResult::success().navigate("servers")
        }));
        engine.process_line("go").unwrap();
        let frame = engine.contexts().current();
        assert_eq!(frame.name(), "other");
        assert_eq!(frame.payload, Some(Value::from("from-rt")));
    }

    #[test]
    fn test_pipeline_forwarding() {
        let (engine, buf) = engine();
        engine.register_command(FnCommand::new(
            CommandSpec::new("pick").allows_pipeline(true),
            |_, _| CommandResult::success().navigate("servers").pipeline("web-1"),
        ));
        engine.register_command(FnCommand::new(
            CommandSpec::new("peek").context("servers"),
            |rt, input| {
                let seen = input.pipeline.as_ref().map(Value::to_string).unwrap_or_default();
                rt.output().info(format!("pipeline={}", seen));
                CommandResult::success()
            },
        ));
        engine.process_line("pick").unwrap();
        assert_eq!(engine.contexts().current().payload, Some(Value::from("web-1")));
        engine.process_line("peek").unwrap();
        assert_eq!(buf.contents(), "pipeline=web-1\n");
    }

    #[test]
    fn test_pipeline_without_permission_stays_put() {
        let (engine, _) = engine();
        engine.register_command(FnCommand::new(CommandSpec::new("stash"), |rt, _| {
            rt.set_pipeline_data("ignored");
            CommandResult::success()
        }));
        engine.process_line("stash").unwrap();
        assert_eq!(engine.contexts().current().payload, None);
    }

    #[test]
    fn test_set_pipeline_data_forwards_in_place() {
        let (engine, _) = engine();
        engine.register_command(FnCommand::new(
            CommandSpec::new("select")
                .context("servers")
                .allows_pipeline(true)
                .arg(crate::ArgSpec::new("name", ArgKind::String).required()),
            |rt, input| {
                rt.set_pipeline_data(input.args.string("name"));
                CommandResult::success()
            },
        ));
        engine.process_line("servers").unwrap();
        engine.process_line("select db-2").unwrap();
        assert_eq!(engine.contexts().current().payload, Some(Value::from("db-2")));
    }

    #[test]
    fn test_navigation_error_is_reported() {
        let (engine, buf) = engine();
        engine.register_command(FnCommand::new(CommandSpec::new("lost"), |_, _| {
            CommandResult::success().navigate("nowhere")
        }));
        engine.process_line("lost").unwrap();
        assert_eq!(buf.contents(), "ERROR: unknown context: nowhere\n");
        assert_eq!(engine.contexts().current_name(), "");
    }

    #[test]
    fn test_parse_error_runs_nothing() {
        let (engine, buf) = engine();
        engine.register_command(FnCommand::new(
            CommandSpec::new("count").flag(FlagSpec::new("n", ArgKind::Int)),
            |rt, _| {
                rt.output().info("ran");
                CommandResult::success()
            },
        ));
        let err = engine.process_line("count --n notanumber").unwrap_err();
        assert!(matches!(err, EngineError::Parse(_)));
        assert_eq!(buf.contents(), "");
    }

    #[test]
    fn test_cancellation_released_after_invocation() {
        let (engine, _) = engine();
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let slot = Arc::clone(&seen);
        engine.register_command(FnCommand::new(CommandSpec::new("hold"), move |rt, _| {
            let token = rt.cancellation().clone();
            *slot.lock() = Some((token.is_cancelled(), token));
            CommandResult::success()
        }));
        engine.process_line("hold").unwrap();
        let (during, token) = seen.lock().take().unwrap();
        assert!(!during);
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_help_command_details() {
        let (engine, buf) = engine();
        engine.process_line("srv").unwrap();
        engine.process_line("help list").unwrap();
        assert!(buf.contents().starts_with("Usage: list\n\nList servers\n"));
        assert!(matches!(
            engine.process_line("help nope"),
            Err(EngineError::UnknownCommand(_))
        ));
    }

    #[test]
    fn test_tasks_table() {
        let (engine, buf) = engine();
        let handle = engine
            .tasks()
            .spawn("warmup", |_, _| Ok(()), Default::default());
        engine.tasks().wait(&handle.id);
        engine.process_line("tasks").unwrap();
        let text = buf.contents();
        assert!(text.starts_with("| ID     | Name   | Status    | Error |\n"));
        assert!(text.contains("task-1   warmup   succeeded"));
    }

    #[test]
    fn test_setters() {
        let (engine, _) = engine();
        engine.set_prompt("");
        assert_eq!(engine.prompt(), "> ");
        engine.set_prompt("$ ");
        assert_eq!(engine.prompt(), "$ ");

        let second = CaptureBuffer::new();
        let _previous = engine.set_output_writer(second.writer());
        engine.set_output_level(OutputLevel::Quiet);
        engine.process_line("contexts").unwrap();
        assert!(second.contents().starts_with("Contexts:"));
    }

    #[test]
    fn test_completion_tree() {
        let (engine, _) = engine();
        let tree = engine.completion_tree();
        let servers = tree.items.iter().find(|i| i.name == "servers").unwrap();
        assert_eq!(servers.children, vec!["list"]);
        assert!(tree.items.iter().any(|i| i.name == "help"));

        engine.process_line("servers").unwrap();
        let inside = engine.completion_tree();
        assert_eq!(inside.items, vec![CompletionItem::leaf("list")]);
    }

    #[test]
    fn test_run_loop_history_and_errors() {
        let (engine, buf) = engine();
        let mut lines = ScriptedLines::new(["bogus", "history", "exit", "never"]);
        engine.run(&mut lines).unwrap();
        assert_eq!(
            buf.contents(),
            "Error: unknown command: bogus\n   1  bogus\n   2  history\nShutting down.\n"
        );
        assert_eq!(lines.history(), vec!["bogus", "history"]);
    }
}
