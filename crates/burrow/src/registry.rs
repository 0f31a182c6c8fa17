//! The command registry.
//!
//! Owns every registered context and command. Commands are keyed per context
//! by name and, redundantly, by each alias, so lookups through an alias and
//! through the canonical name return the same [`CommandEntry`]. Resolution
//! never searches parent contexts and never falls back to root.
//!
//! All state sits behind one reader/writer lock: late registration (for
//! example from extensions) can interleave with lookups from completion
//! refreshes.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::command::{CommandEntry, CommandFactory};
use crate::extension::{
    Extension, ExtensionError, ExtensionReport, RegistryWriter, StagedRegistrations,
    EXTENSION_API_VERSION,
};
use crate::spec::{CommandSpec, ContextSpec};

#[derive(Debug)]
struct RegistryState {
    contexts: HashMap<String, ContextSpec>,
    /// Context alias to canonical name.
    aliases: HashMap<String, String>,
    /// Context name to lookup key to entry.
    commands: HashMap<String, HashMap<String, CommandEntry>>,
}

/// Thread-safe store of contexts and commands.
#[derive(Debug)]
pub struct CommandRegistry {
    state: RwLock<RegistryState>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    /// A registry holding only the root context.
    pub fn new() -> Self {
        let mut contexts = HashMap::new();
        contexts.insert(String::new(), ContextSpec::root());
        Self {
            state: RwLock::new(RegistryState {
                contexts,
                aliases: HashMap::new(),
                commands: HashMap::new(),
            }),
        }
    }

    /// Inserts or replaces a context. Its aliases take over any previous
    /// owner of the same alias.
    pub fn register_context(&self, spec: ContextSpec) {
        debug!(context = %spec.name, "registering context");
        let mut state = self.state.write();
        for alias in &spec.aliases {
            state.aliases.insert(alias.clone(), spec.name.clone());
        }
        state.contexts.insert(spec.name.clone(), spec);
    }

    /// Looks up a context by name or alias.
    pub fn context(&self, name: &str) -> Option<ContextSpec> {
        let state = self.state.read();
        let canonical = state.aliases.get(name).map(String::as_str).unwrap_or(name);
        state.contexts.get(canonical).cloned()
    }

    /// Canonical name for a context name or alias. The root always resolves.
    pub fn resolve_context_name(&self, name: &str) -> Option<String> {
        if name.is_empty() {
            return Some(String::new());
        }
        let state = self.state.read();
        if let Some(canonical) = state.aliases.get(name) {
            return Some(canonical.clone());
        }
        state.contexts.contains_key(name).then(|| name.to_string())
    }

    /// Registers a command under its spec's context.
    ///
    /// # Panics
    ///
    /// If the spec has an empty name.
    pub fn register_command<F: CommandFactory + 'static>(&self, factory: F) {
        self.register_factory(Arc::new(factory));
    }

    /// Like [`register_command`](Self::register_command), for shared factories.
    ///
    /// # Panics
    ///
    /// If the spec has an empty name.
    pub fn register_factory(&self, factory: Arc<dyn CommandFactory>) {
        let spec = factory.spec();
        assert!(!spec.name.is_empty(), "command spec must define a name");
        self.insert_entry(spec, factory);
    }

    fn insert_entry(&self, spec: CommandSpec, factory: Arc<dyn CommandFactory>) {
        debug!(context = %spec.context, command = %spec.name, "registering command");
        let mut state = self.state.write();
        let commands = state.commands.entry(spec.context.clone()).or_default();

        // Drop alias keys left over from an earlier registration of this name.
        commands.retain(|_, entry| entry.spec.name != spec.name);

        let entry = CommandEntry { spec, factory };
        for alias in &entry.spec.aliases {
            commands.insert(alias.clone(), entry.clone());
        }
        commands.insert(entry.spec.name.clone(), entry);
    }

    /// Removes a command (looked up by name or alias) together with every
    /// alias key pointing at it. Returns whether anything was removed.
    pub fn unregister_command(&self, context: &str, name: &str) -> bool {
        let mut state = self.state.write();
        let Some(commands) = state.commands.get_mut(context) else {
            return false;
        };
        let Some(canonical) = commands.get(name).map(|e| e.spec.name.clone()) else {
            return false;
        };
        commands.retain(|_, entry| entry.spec.name != canonical);
        true
    }

    /// Exact lookup of `token` within `context`.
    pub fn resolve(&self, context: &str, token: &str) -> Option<CommandEntry> {
        self.state
            .read()
            .commands
            .get(context)
            .and_then(|commands| commands.get(token))
            .cloned()
    }

    /// Commands of one context, deduplicated and sorted by name.
    pub fn commands(&self, context: &str, include_hidden: bool) -> Vec<CommandSpec> {
        let state = self.state.read();
        match state.commands.get(context) {
            Some(commands) => unique_specs(commands, include_hidden),
            None => Vec::new(),
        }
    }

    /// Registered contexts except root, sorted by name.
    pub fn contexts(&self, include_hidden: bool) -> Vec<ContextSpec> {
        let state = self.state.read();
        let mut specs: Vec<ContextSpec> = state
            .contexts
            .values()
            .filter(|spec| !spec.is_root() && (include_hidden || !spec.hidden))
            .cloned()
            .collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Commands across every context whose name starts with `prefix`.
    pub fn namespace_commands(&self, prefix: &str) -> Vec<CommandSpec> {
        let state = self.state.read();
        let mut specs: Vec<CommandSpec> = state
            .commands
            .iter()
            .filter(|(context, _)| context.starts_with(prefix))
            .flat_map(|(_, commands)| unique_specs(commands, true))
            .collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.context.cmp(&b.context)));
        specs
    }

    /// Loads extensions one by one.
    ///
    /// Each extension's registrations are committed only if its callback
    /// succeeds and every command it staged has a name. Failures are
    /// collected in the report and loading carries on.
    pub fn load_extensions<'a, I>(&self, extensions: I) -> ExtensionReport
    where
        I: IntoIterator<Item = &'a dyn Extension>,
    {
        let mut report = ExtensionReport::default();
        for extension in extensions {
            let name = extension.name().to_string();
            match self.load_extension(extension) {
                Ok(()) => {
                    info!(extension = %name, "loaded extension");
                    report.loaded.push(name);
                }
                Err(e) => {
                    warn!(extension = %name, error = %e, "extension failed to load");
                    report.failed.push((name, e));
                }
            }
        }
        report
    }

    fn load_extension(&self, extension: &dyn Extension) -> Result<(), ExtensionError> {
        let name = extension.name().to_string();
        let found = extension.api_version();
        if found != EXTENSION_API_VERSION {
            return Err(ExtensionError::VersionMismatch {
                name,
                expected: EXTENSION_API_VERSION,
                found,
            });
        }

        let staged = StagedRegistrations::default();
        extension.register(&staged)?;

        let (contexts, commands) = staged.into_parts();
        if commands.iter().any(|(spec, _)| spec.name.is_empty()) {
            return Err(ExtensionError::UnnamedCommand { name });
        }
        for spec in contexts {
            self.register_context(spec);
        }
        for (spec, factory) in commands {
            self.insert_entry(spec, factory);
        }
        Ok(())
    }
}

impl RegistryWriter for CommandRegistry {
    fn register_context(&self, spec: ContextSpec) {
        CommandRegistry::register_context(self, spec);
    }

    fn register_command(&self, factory: Arc<dyn CommandFactory>) {
        self.register_factory(factory);
    }
}

fn unique_specs(commands: &HashMap<String, CommandEntry>, include_hidden: bool) -> Vec<CommandSpec> {
    let unique: BTreeMap<&str, &CommandSpec> = commands
        .values()
        .map(|entry| (entry.spec.name.as_str(), &entry.spec))
        .collect();
    unique
        .into_values()
        .filter(|spec| include_hidden || !spec.hidden)
        .cloned()
        .collect()
}
