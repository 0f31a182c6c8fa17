//! The per-invocation runtime handle.
//!
//! The engine builds one [`Runtime`] for every command it executes. It
//! exposes the shell's shared collaborators and records the command's
//! navigation request, which the engine applies after the command returns.

use std::sync::Arc;

use crate::cancel::CancellationToken;
use crate::context::{ContextError, ContextManager};
use crate::output::OutputChannel;
use crate::session::{ServiceRegistry, SessionStore};
use crate::tasks::TaskManager;
use crate::value::Value;

/// A context transition requested through [`Runtime::navigate_to`].
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationRequest {
    pub context: String,
    pub payload: Option<Value>,
}

/// Services available to a running command.
#[derive(Debug)]
pub struct Runtime {
    session: Arc<SessionStore>,
    services: Arc<ServiceRegistry>,
    output: OutputChannel,
    contexts: Arc<ContextManager>,
    tasks: Arc<TaskManager>,
    cancellation: CancellationToken,
    pipeline: Option<Value>,
    pipeline_changed: bool,
    navigation: Option<NavigationRequest>,
}

impl Runtime {
    pub(crate) fn new(
        session: Arc<SessionStore>,
        services: Arc<ServiceRegistry>,
        output: OutputChannel,
        contexts: Arc<ContextManager>,
        tasks: Arc<TaskManager>,
        cancellation: CancellationToken,
        pipeline: Option<Value>,
    ) -> Self {
        Self {
            session,
            services,
            output,
            contexts,
            tasks,
            cancellation,
            pipeline,
            pipeline_changed: false,
            navigation: None,
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    pub fn output(&self) -> &OutputChannel {
        &self.output
    }

    pub fn contexts(&self) -> &ContextManager {
        &self.contexts
    }

    pub fn tasks(&self) -> &TaskManager {
        &self.tasks
    }

    /// Cancelled when the invocation returns or its timeout elapses.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Requests a transition once the command returns successfully.
    ///
    /// Takes precedence over [`CommandResult::next_context`](crate::CommandResult).
    pub fn navigate_to(&mut self, context: impl Into<String>, payload: Option<Value>) {
        self.navigation = Some(NavigationRequest {
            context: context.into(),
            payload,
        });
    }

    /// Pushes a frame immediately.
    pub fn push_context(&self, name: &str, payload: Option<Value>) -> Result<(), ContextError> {
        self.contexts.push(name, payload)
    }

    /// Pops a frame immediately.
    pub fn pop_context(&self) -> Result<(), ContextError> {
        self.contexts.pop()
    }

    /// The payload inherited from the active frame, or whatever was last
    /// set through [`set_pipeline_data`](Self::set_pipeline_data).
    pub fn pipeline_data(&self) -> Option<&Value> {
        self.pipeline.as_ref()
    }

    /// Replaces the pipeline data. When the command allows forwarding, this
    /// is attached to the next active frame unless the result carries its own.
    pub fn set_pipeline_data(&mut self, data: impl Into<Value>) {
        self.pipeline = Some(data.into());
        self.pipeline_changed = true;
    }

    pub(crate) fn take_navigation(&mut self) -> Option<NavigationRequest> {
        self.navigation.take()
    }

    pub(crate) fn take_changed_pipeline(&mut self) -> Option<Value> {
        if self.pipeline_changed {
            self.pipeline_changed = false;
            self.pipeline.take()
        } else {
            None
        }
    }
}
