//! # Task Table
//!
//! Background work the engine starts and stops as the game state moves.
//! Each task is an OS thread paired with the cancellation token it polls.
//! A name maps to at most one live task.
//!
//! ```text
//!   start(Listener) ──► running ──stop(Listener)──► token.cancel() + join
//!                          │
//!                          └── thread returns on its own ──► finished
//!                              (a later start() replaces it)
//! ```

use std::collections::HashMap;
use std::fmt;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info};
use turnpilot_networking::CancellationToken;

use crate::error::{EngineError, EngineResult};

/// Names of the engine's background tasks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskName {
    /// Game connection and decode loop.
    Listener,
    /// Forwards connection signals to the dispatcher.
    Signals,
    /// Turns announced options into turn commands.
    Navigation,
}

impl TaskName {
    /// Every task, in stop order.
    pub const ALL: [Self; 3] = [Self::Navigation, Self::Signals, Self::Listener];
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Listener => "listener",
            Self::Signals => "signals",
            Self::Navigation => "navigation",
        };
        f.write_str(name)
    }
}

struct TaskHandle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

/// Running tasks, keyed by name.
#[derive(Default)]
pub struct TaskTable {
    tasks: HashMap<TaskName, TaskHandle>,
}

impl TaskTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `name` is running.
    #[must_use]
    pub fn is_running(&self, name: TaskName) -> bool {
        self.tasks
            .get(&name)
            .is_some_and(|task| !task.join.is_finished())
    }

    /// Names of the running tasks, sorted.
    #[must_use]
    pub fn running(&self) -> Vec<TaskName> {
        let mut names: Vec<TaskName> = self
            .tasks
            .iter()
            .filter(|(_, task)| !task.join.is_finished())
            .map(|(name, _)| *name)
            .collect();
        names.sort_unstable();
        names
    }

    /// Starts `task` on its own thread unless `name` is already running.
    ///
    /// Returns `false` if it was already running.
    ///
    /// # Errors
    ///
    /// [`EngineError::Spawn`] if the thread could not be created.
    pub fn start<F>(&mut self, name: TaskName, task: F) -> EngineResult<bool>
    where
        F: FnOnce(CancellationToken) + Send + 'static,
    {
        if self.is_running(name) {
            debug!("Task {} already running", name);
            return Ok(false);
        }
        // A finished task left behind is reaped before replacing it.
        self.stop(name);

        let token = CancellationToken::new();
        let task_token = token.clone();
        let join = thread::Builder::new()
            .name(format!("turnpilot-{name}"))
            .spawn(move || task(task_token))
            .map_err(|source| EngineError::Spawn {
                task: name.to_string(),
                source,
            })?;

        info!("Started {} task", name);
        self.tasks.insert(name, TaskHandle { token, join });
        Ok(true)
    }

    /// Cancels `name` and waits for it to finish.
    ///
    /// Returns `false` if there was nothing to stop.
    pub fn stop(&mut self, name: TaskName) -> bool {
        let Some(task) = self.tasks.remove(&name) else {
            return false;
        };

        task.token.cancel();
        if task.join.join().is_err() {
            error!("Task {} panicked", name);
        }
        debug!("Stopped {} task", name);
        true
    }

    /// Stops every task.
    pub fn stop_all(&mut self) {
        for name in TaskName::ALL {
            self.stop(name);
        }
    }
}

impl Drop for TaskTable {
    fn drop(&mut self) {
        self.stop_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn wait_for_cancel(token: &CancellationToken) {
        while !token.is_cancelled() {
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_start_and_stop() {
        let mut table = TaskTable::new();

        assert!(table.start(TaskName::Navigation, |token| wait_for_cancel(&token)).unwrap());
        assert!(table.is_running(TaskName::Navigation));
        assert_eq!(table.running(), vec![TaskName::Navigation]);

        assert!(table.stop(TaskName::Navigation));
        assert!(!table.is_running(TaskName::Navigation));
        assert!(!table.stop(TaskName::Navigation));
    }

    #[test]
    fn test_second_start_is_ignored_while_running() {
        let mut table = TaskTable::new();
        let starts = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let starts = starts.clone();
            table
                .start(TaskName::Listener, move |token| {
                    starts.fetch_add(1, Ordering::SeqCst);
                    wait_for_cancel(&token);
                })
                .unwrap();
        }

        table.stop_all();
        assert_eq!(starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_finished_task_can_be_restarted() {
        let mut table = TaskTable::new();
        table.start(TaskName::Signals, |_| {}).unwrap();
        while table.is_running(TaskName::Signals) {
            thread::sleep(Duration::from_millis(5));
        }

        assert!(table.start(TaskName::Signals, |token| wait_for_cancel(&token)).unwrap());
        assert!(table.is_running(TaskName::Signals));
    }

    #[test]
    fn test_stop_all() {
        let mut table = TaskTable::new();
        for name in TaskName::ALL {
            table.start(name, |token| wait_for_cancel(&token)).unwrap();
        }

        table.stop_all();

        assert!(table.running().is_empty());
    }
}
