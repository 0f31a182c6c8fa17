//! The navigation stack.
//!
//! [`ContextManager`] keeps an ordered stack of [`ExecutionContext`] frames.
//! The bottom frame is always the root context and can never be removed; the
//! top frame is the current context. Reads return copies, so callers never
//! hold on to live frames.
//!
//! | Operation     | Effect                                               |
//! |---------------|------------------------------------------------------|
//! | `push`        | adds a frame on top of the existing stack            |
//! | `pop`         | removes the top frame; fails at root                 |
//! | `pop_to_root` | truncates to the root frame; never fails             |
//! | `navigate`    | truncates to root, then pushes exactly one frame     |

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::info;

use crate::registry::CommandRegistry;
use crate::spec::ContextSpec;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("unknown context: {0}")]
    Unknown(String),

    #[error("already at root context")]
    AtRoot,
}

/// One frame of the navigation stack.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionContext {
    pub spec: ContextSpec,
    pub local: HashMap<String, Value>,
    pub payload: Option<Value>,
}

impl ExecutionContext {
    fn new(spec: ContextSpec, payload: Option<Value>) -> Self {
        Self {
            spec,
            local: HashMap::new(),
            payload,
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn is_root(&self) -> bool {
        self.spec.is_root()
    }
}

/// Owns the navigation stack and validates names against the registry.
#[derive(Debug)]
pub struct ContextManager {
    stack: RwLock<Vec<ExecutionContext>>,
    registry: Arc<CommandRegistry>,
}

impl ContextManager {
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        let root = registry.context("").unwrap_or_else(ContextSpec::root);
        Self {
            stack: RwLock::new(vec![ExecutionContext::new(root, None)]),
            registry,
        }
    }

    /// Copy of the top frame.
    pub fn current(&self) -> ExecutionContext {
        let stack = self.stack.read();
        stack
            .last()
            .cloned()
            .unwrap_or_else(|| ExecutionContext::new(ContextSpec::root(), None))
    }

    /// Name of the top frame; empty at root.
    pub fn current_name(&self) -> String {
        self.stack
            .read()
            .last()
            .map(|frame| frame.spec.name.clone())
            .unwrap_or_default()
    }

    /// Copy of the whole stack, root first.
    pub fn stack(&self) -> Vec<ExecutionContext> {
        self.stack.read().clone()
    }

    pub fn depth(&self) -> usize {
        self.stack.read().len()
    }

    /// Canonical name for `name`: `::` becomes `.`, then aliases resolve.
    pub fn resolve_name(&self, name: &str) -> Option<String> {
        if name.is_empty() {
            return Some(String::new());
        }
        let normalized = name.replace("::", ".");
        self.registry.context(&normalized).map(|spec| spec.name)
    }

    fn lookup(&self, name: &str) -> Result<ContextSpec, ContextError> {
        let normalized = name.replace("::", ".");
        self.registry
            .context(&normalized)
            .ok_or_else(|| ContextError::Unknown(name.to_string()))
    }

    /// Replaces everything above root with a single frame for `name`.
    /// An empty name is the same as [`pop_to_root`](Self::pop_to_root).
    pub fn navigate(&self, name: &str, payload: Option<Value>) -> Result<(), ContextError> {
        if name.is_empty() {
            self.pop_to_root();
            return Ok(());
        }
        let spec = self.lookup(name)?;
        info!(context = %spec.name, "navigating");
        let mut stack = self.stack.write();
        stack.truncate(1);
        stack.push(ExecutionContext::new(spec, payload));
        Ok(())
    }

    /// Adds a frame for `name` on top of the current stack.
    pub fn push(&self, name: &str, payload: Option<Value>) -> Result<(), ContextError> {
        let spec = self.lookup(name)?;
        info!(context = %spec.name, "pushing context");
        self.stack.write().push(ExecutionContext::new(spec, payload));
        Ok(())
    }

    /// Removes the top frame. Fails without change when only root remains.
    pub fn pop(&self) -> Result<(), ContextError> {
        let mut stack = self.stack.write();
        if stack.len() <= 1 {
            return Err(ContextError::AtRoot);
        }
        stack.pop();
        Ok(())
    }

    pub fn pop_to_root(&self) {
        self.stack.write().truncate(1);
    }

    /// Prompt for the current frame.
    ///
    /// Root uses `base` verbatim. Other contexts substitute `{base}` and
    /// `{context}` in their template, or fall back to `<base><name>> `.
    pub fn prompt(&self, base: &str) -> String {
        let current = self.current();
        if current.is_root() {
            return base.to_string();
        }
        if current.spec.prompt.is_empty() {
            return format!("{}{}> ", base, current.spec.name);
        }
        current
            .spec
            .prompt
            .replace("{base}", base)
            .replace("{context}", &current.spec.name)
    }

    /// `servers > detail`; empty at root.
    pub fn breadcrumb(&self) -> String {
        self.stack
            .read()
            .iter()
            .skip(1)
            .map(|frame| frame.spec.name.as_str())
            .collect::<Vec<_>>()
            .join(" > ")
    }

    /// Replaces the payload of the top frame.
    pub fn set_current_payload(&self, payload: Option<Value>) {
        if let Some(top) = self.stack.write().last_mut() {
            top.payload = payload;
        }
    }

    /// Stores a value in the top frame's local state.
    pub fn set_local(&self, key: impl Into<String>, value: impl Into<Value>) {
        if let Some(top) = self.stack.write().last_mut() {
            top.local.insert(key.into(), value.into());
        }
    }

    pub fn local(&self, key: &str) -> Option<Value> {
        self.stack
            .read()
            .last()
            .and_then(|top| top.local.get(key).cloned())
    }
}
