//! Background task supervision.
//!
//! [`TaskManager::spawn`] runs a closure on its own thread with a fresh
//! [`CancellationToken`] and the shared [`OutputChannel`]. Every task moves
//! through `pending → running → {succeeded, failed, cancelled}`; terminal
//! states are final. Callers only ever receive [`TaskHandle`] snapshots.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, warn};

use crate::cancel::{CancellationToken, Cancelled};
use crate::middleware::panic_message;
use crate::output::OutputChannel;
use crate::value::Value;

/// Lifecycle state of a background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Options for [`TaskManager::spawn`].
#[derive(Debug, Clone, Default)]
pub struct TaskOptions {
    pub timeout: Option<Duration>,
    pub metadata: HashMap<String, Value>,
}

impl TaskOptions {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Snapshot of a task's state at the time it was requested.
#[derive(Debug, Clone, Serialize)]
pub struct TaskHandle {
    pub id: String,
    pub name: String,
    pub status: TaskStatus,
    /// Error text for failed or cancelled tasks.
    pub error: Option<String>,
    pub metadata: HashMap<String, Value>,
}

struct TaskRecord {
    seq: u64,
    handle: TaskHandle,
    token: CancellationToken,
}

#[derive(Default)]
struct TaskTable {
    seq: u64,
    tasks: HashMap<String, TaskRecord>,
}

/// Supervises background work spawned by commands.
pub struct TaskManager {
    table: Arc<RwLock<TaskTable>>,
    joins: Mutex<HashMap<String, JoinHandle<()>>>,
    output: OutputChannel,
}

impl fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskManager")
            .field("tasks", &self.table.read().tasks.len())
            .finish()
    }
}

impl TaskManager {
    pub fn new(output: OutputChannel) -> Self {
        Self {
            table: Arc::new(RwLock::new(TaskTable::default())),
            joins: Mutex::new(HashMap::new()),
            output,
        }
    }

    /// Launches `task` on a new thread and returns its initial snapshot.
    ///
    /// A task ending in an error that downcasts to [`Cancelled`], or in any
    /// error after its token was cancelled, is recorded as `cancelled`. A
    /// panicking task is recorded as `failed`.
    pub fn spawn<F>(&self, name: impl Into<String>, task: F, opts: TaskOptions) -> TaskHandle
    where
        F: FnOnce(CancellationToken, OutputChannel) -> anyhow::Result<()> + Send + 'static,
    {
        let token = match opts.timeout {
            Some(timeout) => CancellationToken::with_timeout(timeout),
            None => CancellationToken::new(),
        };

        let snapshot = {
            let mut table = self.table.write();
            table.seq += 1;
            let seq = table.seq;
            let handle = TaskHandle {
                id: format!("task-{}", seq),
                name: name.into(),
                status: TaskStatus::Pending,
                error: None,
                metadata: opts.metadata,
            };
            table.tasks.insert(
                handle.id.clone(),
                TaskRecord {
                    seq,
                    handle: handle.clone(),
                    token: token.clone(),
                },
            );
            handle
        };

        debug!(task = %snapshot.id, name = %snapshot.name, "spawning task");

        let table = Arc::clone(&self.table);
        let output = self.output.clone();
        let id = snapshot.id.clone();
        let join = std::thread::spawn(move || {
            update_status(&table, &id, TaskStatus::Running, None);
            let result = catch_unwind(AssertUnwindSafe(|| task(token.clone(), output)));
            let (status, error) = match result {
                Err(panic) => {
                    let reason = panic_message(panic.as_ref());
                    warn!(task = %id, %reason, "task panicked");
                    (TaskStatus::Failed, Some(format!("task panicked: {}", reason)))
                }
                Ok(Ok(())) => (TaskStatus::Succeeded, None),
                Ok(Err(e)) if e.is::<Cancelled>() || token.is_cancelled() => {
                    (TaskStatus::Cancelled, Some(e.to_string()))
                }
                Ok(Err(e)) => {
                    warn!(task = %id, error = %e, "task failed");
                    (TaskStatus::Failed, Some(e.to_string()))
                }
            };
            update_status(&table, &id, status, error);
        });
        {
            let mut joins = self.joins.lock();
            joins.retain(|_, j| !j.is_finished());
            joins.insert(snapshot.id.clone(), join);
        }

        snapshot
    }

    /// Requests cancellation. Returns `false` for unknown ids.
    pub fn cancel(&self, id: &str) -> bool {
        let token = self.table.read().tasks.get(id).map(|r| r.token.clone());
        match token {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Snapshots of every task, in spawn order.
    pub fn tasks(&self) -> Vec<TaskHandle> {
        let table = self.table.read();
        let mut records: Vec<&TaskRecord> = table.tasks.values().collect();
        records.sort_by_key(|r| r.seq);
        records.into_iter().map(|r| r.handle.clone()).collect()
    }

    pub fn describe(&self, id: &str) -> Option<TaskHandle> {
        self.table.read().tasks.get(id).map(|r| r.handle.clone())
    }

    #[cfg(test)]
    fn tracked_threads(&self) -> usize {
        self.joins.lock().len()
    }

    /// Blocks until the task's thread exits and returns its final snapshot.
    /// Tasks whose thread already exited return immediately.
    pub fn wait(&self, id: &str) -> Option<TaskHandle> {
        let join = self.joins.lock().remove(id);
        if let Some(join) = join {
            if join.join().is_err() {
                update_status(
                    &self.table,
                    id,
                    TaskStatus::Failed,
                    Some("task panicked".to_string()),
                );
            }
        }
        self.describe(id)
    }
}

fn update_status(table: &RwLock<TaskTable>, id: &str, status: TaskStatus, error: Option<String>) {
    let mut table = table.write();
    if let Some(record) = table.tasks.get_mut(id) {
        if record.handle.status.is_terminal() {
            return;
        }
        record.handle.status = status;
        record.handle.error = error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::CaptureBuffer;
    use std::sync::mpsc;

    fn manager() -> (TaskManager, CaptureBuffer) {
        let buf = CaptureBuffer::new();
        (TaskManager::new(OutputChannel::new(buf.writer())), buf)
    }

    #[test]
    fn test_task_succeeds() {
        let (tasks, buf) = manager();
        let handle = tasks.spawn(
            "hello",
            |_, out| {
                out.info("from task");
                Ok(())
            },
            TaskOptions::default(),
        );
        assert_eq!(handle.id, "task-1");
        assert_eq!(handle.status, TaskStatus::Pending);

        let done = tasks.wait(&handle.id).unwrap();
        assert_eq!(done.status, TaskStatus::Succeeded);
        assert_eq!(buf.contents(), "from task\n");
    }

    #[test]
    fn test_task_fails() {
        let (tasks, _) = manager();
        let handle = tasks.spawn("boom", |_, _| anyhow::bail!("nope"), TaskOptions::default());
        let done = tasks.wait(&handle.id).unwrap();
        assert_eq!(done.status, TaskStatus::Failed);
        assert_eq!(done.error.as_deref(), Some("nope"));
    }

    #[test]
    fn test_task_cancelled() {
        let (tasks, _) = manager();
        let (started_tx, started_rx) = mpsc::channel();
        let handle = tasks.spawn(
            "spin",
            move |token, _| {
                let _ = started_tx.send(());
                loop {
                    token.check()?;
                    std::thread::sleep(Duration::from_millis(5));
                }
            },
            TaskOptions::default(),
        );
        started_rx.recv().unwrap();
        assert!(tasks.cancel(&handle.id));
        assert_eq!(tasks.wait(&handle.id).unwrap().status, TaskStatus::Cancelled);
        assert!(!tasks.cancel("task-99"));
    }

    #[test]
    fn test_task_timeout() {
        let (tasks, _) = manager();
        let handle = tasks.spawn(
            "slow",
            |token, _| loop {
                token.check()?;
                std::thread::sleep(Duration::from_millis(5));
            },
            TaskOptions::default().timeout(Duration::from_millis(20)),
        );
        assert_eq!(tasks.wait(&handle.id).unwrap().status, TaskStatus::Cancelled);
    }

    #[test]
    fn test_listing_is_ordered_snapshot() {
        let (tasks, _) = manager();
        for name in ["a", "b", "c"] {
            let h = tasks.spawn(name, |_, _| Ok(()), TaskOptions::default().metadata("k", name));
            tasks.wait(&h.id);
        }
        let ids: Vec<String> = tasks.tasks().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["task-1", "task-2", "task-3"]);
        assert_eq!(
            tasks.describe("task-2").unwrap().metadata.get("k"),
            Some(&Value::from("b"))
        );
    }

    fn poll_until(mut done: impl FnMut() -> bool) {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !done() {
            assert!(std::time::Instant::now() < deadline, "timed out");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_panicking_task_is_marked_failed() {
        let (tasks, _) = manager();
        let handle = tasks.spawn(
            "kaboom",
            |_, _| -> anyhow::Result<()> { panic!("kaboom") },
            TaskOptions::default(),
        );

        // No wait(): the listing alone must settle on a terminal state.
        poll_until(|| tasks.describe(&handle.id).unwrap().status.is_terminal());
        let done = tasks.describe(&handle.id).unwrap();
        assert_eq!(done.status, TaskStatus::Failed);
        assert_eq!(done.error.as_deref(), Some("task panicked: kaboom"));
        assert_eq!(tasks.tasks()[0].status, TaskStatus::Failed);

        assert_eq!(tasks.wait(&handle.id).unwrap().status, TaskStatus::Failed);
    }

    #[test]
    fn test_finished_threads_are_pruned() {
        let (tasks, _) = manager();
        for i in 0..20 {
            tasks.spawn(format!("quick-{}", i), |_, _| Ok(()), TaskOptions::default());
        }
        poll_until(|| tasks.joins.lock().values().all(|j| j.is_finished()));

        let last = tasks.spawn("last", |_, _| Ok(()), TaskOptions::default());
        assert_eq!(tasks.tracked_threads(), 1);
        assert_eq!(tasks.wait(&last.id).unwrap().status, TaskStatus::Succeeded);
        assert_eq!(tasks.wait("task-3").unwrap().status, TaskStatus::Succeeded);
        assert_eq!(tasks.tasks().len(), 21);
    }

    #[test]
    fn test_terminal_state_is_final() {
        let table = RwLock::new(TaskTable::default());
        table.write().tasks.insert(
            "task-1".into(),
            TaskRecord {
                seq: 1,
                handle: TaskHandle {
                    id: "task-1".into(),
                    name: "x".into(),
                    status: TaskStatus::Succeeded,
                    error: None,
                    metadata: HashMap::new(),
                },
                token: CancellationToken::new(),
            },
        );
        update_status(&table, "task-1", TaskStatus::Failed, Some("late".into()));
        assert_eq!(table.read().tasks["task-1"].handle.status, TaskStatus::Succeeded);
    }
}
