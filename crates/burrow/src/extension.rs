//! Registration entry point for extensions.
//!
//! An [`Extension`] receives only a [`RegistryWriter`]: it can add contexts
//! and commands but cannot read or remove anything. Extensions are loaded
//! once at startup through
//! [`CommandRegistry::load_extensions`](crate::CommandRegistry::load_extensions);
//! each one's registrations are staged and committed only when its callback
//! succeeds, so a failing extension leaves no trace and does not affect the
//! others.
//!
//! ```rust
//! use std::sync::Arc;
//! use burrow::{
//!     CommandRegistry, CommandResult, CommandSpec, ContextSpec, Extension, FnCommand,
//!     FnExtension, RegistryWriter,
//! };
//!
//! let ops = FnExtension::new("ops", |registry| {
//!     registry.register_context(ContextSpec::new("ops"));
//!     registry.register_command(Arc::new(FnCommand::new(
//!         CommandSpec::new("status").context("ops"),
//!         |_, _| CommandResult::success(),
//!     )));
//!     Ok(())
//! });
//!
//! let registry = CommandRegistry::new();
//! let report = registry.load_extensions([&ops as &dyn Extension]);
//! assert_eq!(report.loaded, vec!["ops"]);
//! assert!(registry.resolve("ops", "status").is_some());
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::command::CommandFactory;
use crate::spec::{CommandSpec, ContextSpec};

/// Registration interface version an extension is built against.
pub const EXTENSION_API_VERSION: u32 = 1;

/// Write-only view of the registry handed to extensions.
pub trait RegistryWriter {
    fn register_context(&self, spec: ContextSpec);
    fn register_command(&self, factory: Arc<dyn CommandFactory>);
}

/// A unit of contexts and commands loaded at startup.
pub trait Extension: Send + Sync {
    fn name(&self) -> &str;

    fn api_version(&self) -> u32 {
        EXTENSION_API_VERSION
    }

    fn register(&self, registry: &dyn RegistryWriter) -> Result<(), ExtensionError>;
}

#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error("extension {name} targets api version {found}, host supports {expected}")]
    VersionMismatch {
        name: String,
        expected: u32,
        found: u32,
    },

    #[error("extension {name} registered a command without a name")]
    UnnamedCommand { name: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Outcome of [`CommandRegistry::load_extensions`](crate::CommandRegistry::load_extensions).
#[derive(Debug, Default)]
pub struct ExtensionReport {
    pub loaded: Vec<String>,
    pub failed: Vec<(String, ExtensionError)>,
}

impl ExtensionReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Collects registrations until the extension's callback has succeeded.
#[derive(Default)]
pub(crate) struct StagedRegistrations {
    contexts: Mutex<Vec<ContextSpec>>,
    commands: Mutex<Vec<(CommandSpec, Arc<dyn CommandFactory>)>>,
}

impl StagedRegistrations {
    pub(crate) fn into_parts(self) -> (Vec<ContextSpec>, Vec<(CommandSpec, Arc<dyn CommandFactory>)>) {
        (self.contexts.into_inner(), self.commands.into_inner())
    }
}

impl RegistryWriter for StagedRegistrations {
    fn register_context(&self, spec: ContextSpec) {
        self.contexts.lock().push(spec);
    }

    fn register_command(&self, factory: Arc<dyn CommandFactory>) {
        let spec = factory.spec();
        self.commands.lock().push((spec, factory));
    }
}

type RegisterFn = dyn Fn(&dyn RegistryWriter) -> Result<(), ExtensionError> + Send + Sync;

/// An extension backed by a closure.
pub struct FnExtension {
    name: String,
    version: u32,
    register: Box<RegisterFn>,
}

impl FnExtension {
    pub fn new<F>(name: impl Into<String>, register: F) -> Self
    where
        F: Fn(&dyn RegistryWriter) -> Result<(), ExtensionError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            version: EXTENSION_API_VERSION,
            register: Box::new(register),
        }
    }

    /// Overrides the declared api version.
    pub fn with_api_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }
}

impl fmt::Debug for FnExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnExtension")
            .field("name", &self.name)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl Extension for FnExtension {
    fn name(&self) -> &str {
        &self.name
    }

    fn api_version(&self) -> u32 {
        self.version
    }

    fn register(&self, registry: &dyn RegistryWriter) -> Result<(), ExtensionError> {
        (self.register)(registry)
    }
}
