//! Cancellable delayed tasks keyed by id.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use tokio::task::AbortHandle;

/// Owns the abort handles of every pending task. Scheduling under an id that
/// is already pending replaces (and aborts) the old task.
#[derive(Debug, Default)]
pub struct ScheduledTasks {
    tasks: Mutex<HashMap<String, AbortHandle>>,
}

impl ScheduledTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `task` under `id`. Must be called inside a Tokio runtime.
    ///
    /// The task should call [`ScheduledTasks::finish`] when it completes.
    pub fn schedule<F>(&self, id: &str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.lock();
        // Spawn while holding the lock so `finish` from the task cannot run
        // before the handle is stored.
        let handle = tokio::spawn(task).abort_handle();
        if let Some(old) = tasks.insert(id.to_string(), handle) {
            old.abort();
        }
    }

    /// Abort the task under `id`. Returns whether one was pending.
    pub fn cancel(&self, id: &str) -> bool {
        match self.lock().remove(id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Forget a task that has run to completion.
    pub fn finish(&self, id: &str) {
        self.lock().remove(id);
    }

    pub fn cancel_all(&self) -> usize {
        let drained: Vec<_> = self.lock().drain().collect();
        for (_, handle) in &drained {
            handle.abort();
        }
        drained.len()
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, AbortHandle>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for ScheduledTasks {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
