//! `burrowsh`: a small server-inventory shell built on burrow.
//!
//! ```text
//! > servers
//! > servers> add web-1 --port 8080 --role web
//! > servers> list --json
//! > servers> show web-1
//! > servers> /
//! > sleep 2s
//! > tasks
//! ```
//!
//! `--script FILE` runs the lines of FILE instead of reading the terminal.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::Context as _;
use burrow::{
    init_logging, install_panic_hook, ArgKind, ArgSpec, CommandResult, CommandSpec, ContextSpec, Engine,
    EngineBuilder, FlagSpec, FnCommand, RustylineEditor, ScriptedLines, ShellConfig, TaskOptions,
};
use clap::Parser;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::info;

/// Interactive server inventory shell
#[derive(Parser)]
#[command(name = "burrowsh")]
#[command(version)]
struct Cli {
    /// Base prompt shown at root
    #[arg(long)]
    prompt: Option<String>,

    /// YAML or JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `burrow=debug,warn`
    #[arg(long)]
    log_level: Option<String>,

    /// Persist line history to this file
    #[arg(long)]
    history: Option<PathBuf>,

    /// Run the lines of a file instead of reading the terminal
    #[arg(long)]
    script: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
struct Server {
    name: String,
    port: i64,
    role: String,
}

#[derive(Debug, Default)]
struct Inventory {
    servers: RwLock<Vec<Server>>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ShellConfig::load(path)?,
        None => ShellConfig::default(),
    };
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(prompt) = cli.prompt {
        config.prompt = prompt;
    }
    if let Some(history) = cli.history {
        config.history_file = Some(history);
    }
    init_logging(&config.logging)?;
    install_panic_hook();

    let engine = build_engine(EngineBuilder::from_config(&config));
    info!(prompt = %config.prompt, "shell ready");

    match cli.script {
        Some(path) => {
            let file = File::open(&path)
                .with_context(|| format!("failed to open script {}", path.display()))?;
            let mut lines = ScriptedLines::from_reader(BufReader::new(file))?;
            engine.run(&mut lines)?;
        }
        None => {
            let mut editor = RustylineEditor::new(config.history_limit)?;
            if let Some(path) = &config.history_file {
                editor = editor.with_history_file(path)?;
            }
            engine.run(&mut editor)?;
        }
    }
    Ok(())
}

fn build_engine(builder: EngineBuilder) -> Engine {
    let engine = builder
        .services(|services| services.register("inventory", Inventory::default()))
        .build();

    engine.register_context(
        ContextSpec::new("servers")
            .alias("srv")
            .description("Browse and edit the server inventory"),
    );
    register_server_commands(&engine);
    register_root_commands(&engine);
    engine
}

fn register_server_commands(engine: &Engine) {
    engine.register_command(FnCommand::new(
        CommandSpec::new("list")
            .context("servers")
            .alias("l")
            .summary("List servers")
            .flag(FlagSpec::new("role", ArgKind::String).short('r').description("Only this role"))
            .flag(FlagSpec::new("json", ArgKind::Bool).description("Print as JSON")),
        |rt, input| {
            let inventory = match rt.services().require::<Inventory>("inventory") {
                Ok(inventory) => inventory,
                Err(e) => return CommandResult::failed(e),
            };
            let role = input.flags.string("role");
            let servers: Vec<Server> = inventory
                .servers
                .read()
                .iter()
                .filter(|s| role.is_empty() || s.role == role)
                .cloned()
                .collect();

            if input.flags.bool("json") {
                rt.output().write_json(&servers);
            } else if servers.is_empty() {
                rt.output().info("No servers.");
            } else {
                let rows: Vec<Vec<String>> = servers
                    .iter()
                    .map(|s| vec![s.name.clone(), s.port.to_string(), s.role.clone()])
                    .collect();
                rt.output().write_table(&["Name", "Port", "Role"], &rows);
            }
            CommandResult::success().with_payload(servers.len() as i64)
        },
    ));

    engine.register_command(FnCommand::new(
        CommandSpec::new("add")
            .context("servers")
            .summary("Add a server")
            .arg(ArgSpec::new("name", ArgKind::String).required().description("Host name"))
            .flag(FlagSpec::new("port", ArgKind::Int).short('p').default_value(22))
            .flag(FlagSpec::new("role", ArgKind::Enum).one_of(["web", "db", "cache"]).default_value("web"))
            .example("Add a database host", "add db-1 --port 5432 --role db"),
        |rt, input| {
            let inventory = match rt.services().require::<Inventory>("inventory") {
                Ok(inventory) => inventory,
                Err(e) => return CommandResult::failed(e),
            };
            let name = input.args.string("name");
            let mut servers = inventory.servers.write();
            if servers.iter().any(|s| s.name == name) {
                return CommandResult::failed(
                    burrow::CommandError::new(format!("server {} already exists", name))
                        .hint("use a different name"),
                );
            }
            servers.push(Server {
                name: name.clone(),
                port: input.flags.int("port"),
                role: input.flags.string("role"),
            });
            CommandResult::success().info(format!("added {}", name))
        },
    ));

    engine.register_command(FnCommand::new(
        CommandSpec::new("show")
            .context("servers")
            .summary("Show one server and remember it")
            .allows_pipeline(true)
            .arg(ArgSpec::new("name", ArgKind::String).required()),
        |rt, input| {
            let inventory = match rt.services().require::<Inventory>("inventory") {
                Ok(inventory) => inventory,
                Err(e) => return CommandResult::failed(e),
            };
            let name = input.args.string("name");
            let found = inventory
                .servers
                .read()
                .iter()
                .find(|s| s.name == name)
                .cloned();
            match found {
                Some(server) => {
                    rt.output().write_json(&server);
                    rt.set_pipeline_data(server.name);
                    CommandResult::success()
                }
                None => CommandResult::failed(format!("no server named {}", name)),
            }
        },
    ));
}

fn register_root_commands(engine: &Engine) {
    engine.register_command(FnCommand::new(
        CommandSpec::new("echo")
            .summary("Print the arguments")
            .arg(ArgSpec::new("words", ArgKind::String).repeatable()),
        |rt, input| {
            rt.output().info(input.args.strings("words").join(" "));
            CommandResult::success()
        },
    ));

    engine.register_command(FnCommand::new(
        CommandSpec::new("sleep")
            .summary("Sleep in the background")
            .arg(ArgSpec::new("for", ArgKind::Duration).required()),
        |rt, input| {
            let duration = input.args.duration("for");
            let handle = rt.tasks().spawn(
                "sleep",
                move |token, output| {
                    let deadline = std::time::Instant::now() + duration;
                    while std::time::Instant::now() < deadline {
                        token.check()?;
                        std::thread::sleep(std::time::Duration::from_millis(50));
                    }
                    output.debug("sleep finished");
                    Ok(())
                },
                TaskOptions::default().metadata("duration", duration),
            );
            CommandResult::success().info(format!("started {}", handle.id))
        },
    ));
}
