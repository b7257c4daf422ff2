//! Registry of in-flight fetches
//!
//! Tracks every request handed to the transport, keyed by its
//! [`TaskHandle`], from registration until completion. Tasks are keyed by
//! handle rather than URL, so concurrent requests for the same URL are
//! tracked independently.
//!
//! A completed task stays counted as "settling" until the orchestrator has
//! finished with it (cache write, callback queued). [`PendingTaskRegistry::is_empty`]
//! only reports true once nothing is in flight *and* nothing is settling,
//! which is what synchronous waiters need.

pub mod task;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::{debug, error};
use url::Url;

use crate::errors::{ConsistencyError, ConsistencyResult};

pub use task::{PendingTask, TaskHandle};

use task::HandleGenerator;

/// In-flight task bookkeeping
#[derive(Debug)]
pub struct PendingTaskRegistry {
    tasks: Mutex<HashMap<TaskHandle, PendingTask>>,
    settling: AtomicUsize,
    handles: HandleGenerator,
}

/// Keeps a completed task counted until dropped
#[must_use = "the task counts as in flight until this guard is dropped"]
#[derive(Debug)]
pub struct Settling<'a> {
    counter: &'a AtomicUsize,
}

impl Drop for Settling<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}

impl PendingTaskRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            settling: AtomicUsize::new(0),
            handles: HandleGenerator::new(),
        }
    }

    /// Allocate a fresh, never-registered handle
    pub fn next_handle(&self) -> TaskHandle {
        self.handles.generate()
    }

    /// Register a task
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::DuplicateRegistration` if the handle is
    /// already registered; the existing task and its bytes are left intact.
    pub fn register(&self, task: PendingTask) -> ConsistencyResult<()> {
        let mut tasks = self.tasks.lock();
        Self::insert(&mut tasks, task)
    }

    /// Register a task unless one for the same URL is already in flight
    ///
    /// The check and the insert happen under one lock, so concurrent callers
    /// for the same URL register at most one task between them. A rejected
    /// task is handed back untouched.
    pub fn register_unique(&self, task: PendingTask) -> Result<(), PendingTask> {
        let mut tasks = self.tasks.lock();
        if tasks
            .values()
            .any(|pending| pending.original_url() == task.original_url())
        {
            debug!(
                "{} for {} is a duplicate of an in-flight task",
                task.handle(),
                task.original_url()
            );
            return Err(task);
        }

        // Handles come from the generator, so this only fails on a bug
        let _ = Self::insert(&mut tasks, task);
        Ok(())
    }

    fn insert(
        tasks: &mut HashMap<TaskHandle, PendingTask>,
        task: PendingTask,
    ) -> ConsistencyResult<()> {
        let handle = task.handle();
        if tasks.contains_key(&handle) {
            let err = ConsistencyError::DuplicateRegistration { handle };
            error!("{}", err);
            debug_assert!(false, "{}", err);
            return Err(err);
        }

        debug!("Registered {} for {}", handle, task.original_url());
        tasks.insert(handle, task);
        Ok(())
    }

    /// Append a received chunk to the task's accumulator
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::UnknownTask` if the handle is not registered
    pub fn append_data(&self, handle: TaskHandle, chunk: &[u8]) -> ConsistencyResult<()> {
        let mut tasks = self.tasks.lock();
        match tasks.get_mut(&handle) {
            Some(task) => {
                task.append(chunk);
                Ok(())
            }
            None => {
                let err = ConsistencyError::UnknownTask { handle };
                error!("Data for unregistered task: {}", err);
                debug_assert!(false, "{}", err);
                Err(err)
            }
        }
    }

    /// Remove and return a task
    ///
    /// The returned [`Settling`] guard keeps [`is_empty`](Self::is_empty)
    /// false until it is dropped.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::UnknownTask` if the handle is not
    /// registered, e.g. when it is completed twice
    pub fn complete(&self, handle: TaskHandle) -> ConsistencyResult<(PendingTask, Settling<'_>)> {
        let mut tasks = self.tasks.lock();
        match tasks.remove(&handle) {
            Some(task) => {
                self.settling.fetch_add(1, Ordering::AcqRel);
                debug!(
                    "Completed {} after {:.3}s ({} bytes)",
                    handle,
                    task.elapsed().as_secs_f64(),
                    task.data().len()
                );
                Ok((
                    task,
                    Settling {
                        counter: &self.settling,
                    },
                ))
            }
            None => {
                let err = ConsistencyError::UnknownTask { handle };
                error!("Completion for unregistered task: {}", err);
                debug_assert!(false, "{}", err);
                Err(err)
            }
        }
    }

    /// True iff nothing is in flight and no completion is still settling
    pub fn is_empty(&self) -> bool {
        let tasks = self.tasks.lock();
        tasks.is_empty() && self.settling.load(Ordering::Acquire) == 0
    }

    /// Number of registered (not yet completed) tasks
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Check whether a task for `url` (pre-redirect) is in flight
    pub fn is_in_flight(&self, url: &Url) -> bool {
        self.tasks
            .lock()
            .values()
            .any(|task| task.original_url() == url)
    }

    /// Handles of all registered tasks, in issue order
    pub fn handles(&self) -> Vec<TaskHandle> {
        let mut handles: Vec<_> = self.tasks.lock().keys().copied().collect();
        handles.sort();
        handles
    }
}

impl Default for PendingTaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}
