//! Interceptors around command execution.
//!
//! Middleware wraps the core handler (create the command from its factory,
//! then execute it). The engine keeps an ordered list; the first entry is
//! outermost. Each middleware receives a [`Next`] capability and decides
//! whether and when to delegate:
//!
//! ```text
//! Recovery → Timing → user middleware → factory.create + execute
//! ```
//!
//! A middleware may
//!
//! - run code before and after `next.run(..)`,
//! - short-circuit by returning its own result without delegating,
//! - rewrite the result on the way out.
//!
//! [`Recovery`] is installed outermost by default and turns a panicking
//! command into a failed result, so one bad command never takes the shell
//! down.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, warn};

use crate::command::{CommandEntry, CommandError, CommandInput, CommandResult};
use crate::duration::format_duration;
use crate::runtime::Runtime;

/// A cross-cutting wrapper around command execution.
pub trait Middleware: Send + Sync {
    fn handle(
        &self,
        rt: &mut Runtime,
        input: &CommandInput,
        entry: &CommandEntry,
        next: Next<'_>,
    ) -> CommandResult;
}

/// The rest of the chain. Consumed by [`Next::run`].
pub struct Next<'a> {
    chain: &'a [Arc<dyn Middleware>],
    entry: &'a CommandEntry,
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.chain.len())
            .field("command", &self.entry.spec.name)
            .finish()
    }
}

impl<'a> Next<'a> {
    pub(crate) fn new(chain: &'a [Arc<dyn Middleware>], entry: &'a CommandEntry) -> Self {
        Self { chain, entry }
    }

    /// Runs the remaining middleware and then the command itself.
    pub fn run(self, rt: &mut Runtime, input: &CommandInput) -> CommandResult {
        match self.chain.split_first() {
            Some((head, rest)) => head.handle(rt, input, self.entry, Next::new(rest, self.entry)),
            None => invoke(self.entry, rt, input),
        }
    }
}

fn invoke(entry: &CommandEntry, rt: &mut Runtime, input: &CommandInput) -> CommandResult {
    match entry.factory.create(rt) {
        Ok(mut command) => command.execute(rt, input),
        Err(e) => {
            warn!(command = %entry.spec.name, error = %e, "failed to create command");
            CommandResult::failed(CommandError::new("failed to create command").with_source(e))
        }
    }
}

type MiddlewareFn =
    dyn for<'a> Fn(&mut Runtime, &CommandInput, &CommandEntry, Next<'a>) -> CommandResult + Send + Sync;

/// Middleware backed by a closure.
pub struct FnMiddleware {
    f: Box<MiddlewareFn>,
}

impl fmt::Debug for FnMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnMiddleware")
    }
}

impl Middleware for FnMiddleware {
    fn handle(
        &self,
        rt: &mut Runtime,
        input: &CommandInput,
        entry: &CommandEntry,
        next: Next<'_>,
    ) -> CommandResult {
        (self.f)(rt, input, entry, next)
    }
}

/// Wraps a closure as [`Middleware`].
///
/// ```rust
/// use burrow::middleware;
///
/// let audit = middleware::from_fn(|rt, input, entry, next| {
///     rt.output().debug(format!("running {} {:?}", entry.spec.name, input.raw));
///     next.run(rt, input)
/// });
/// # let _ = audit;
/// ```
pub fn from_fn<F>(f: F) -> FnMiddleware
where
    F: for<'a> Fn(&mut Runtime, &CommandInput, &CommandEntry, Next<'a>) -> CommandResult
        + Send
        + Sync
        + 'static,
{
    FnMiddleware { f: Box::new(f) }
}

/// Converts a panic inside the wrapped call into a failed result.
///
/// The process panic hook still runs before the unwind is caught, so the
/// default hook prints `thread '..' panicked at ..` to stderr on top of the
/// `ERROR:` line. Interactive shells usually want [`install_panic_hook`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Recovery;

impl Middleware for Recovery {
    fn handle(
        &self,
        rt: &mut Runtime,
        input: &CommandInput,
        entry: &CommandEntry,
        next: Next<'_>,
    ) -> CommandResult {
        match catch_unwind(AssertUnwindSafe(|| next.run(rt, input))) {
            Ok(result) => result,
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(command = %entry.spec.name, %reason, "command panicked");
                CommandResult::failed(format!(
                    "command {} panicked: {}",
                    entry.spec.name, reason
                ))
            }
        }
    }
}

/// Replaces the process panic hook with one that logs through `tracing`.
///
/// Panics then show up as `error` events on the `burrow::panic` target
/// instead of raw stderr text. Call once at startup, after logging is
/// initialised.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let reason = panic_message(info.payload());
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_default();
        error!(target: "burrow::panic", %location, "panicked: {}", reason);
    }));
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Reports how long each command took, truncated to milliseconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timing;

impl Middleware for Timing {
    fn handle(
        &self,
        rt: &mut Runtime,
        input: &CommandInput,
        entry: &CommandEntry,
        next: Next<'_>,
    ) -> CommandResult {
        let start = Instant::now();
        let result = next.run(rt, input);
        let elapsed = Duration::from_millis(start.elapsed().as_millis() as u64);
        rt.output().info(format!(
            "{} finished in {}",
            entry.spec.name,
            format_duration(elapsed)
        ));
        result
    }
}
