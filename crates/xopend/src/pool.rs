//! Fixed-size worker pool for background table maintenance.
//!
//! `reload` and `update` run here so that slow disk or network work never
//! holds up a connection. Submission is fire-and-forget: callers get no
//! result back and must not assume tasks finish in submission order, since
//! several workers drain the same queue.
//!
//! Shutdown enqueues one stop message per worker behind any pending tasks, so
//! everything submitted before shutdown still runs before the workers exit.
//! Submission and shutdown share a gate lock: a task is either queued ahead of
//! the stop messages or refused with [`PoolError::Closed`].

use std::any::Any;
use std::error::Error;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, unbounded};
use thiserror::Error;
use tracing::{debug, error};

const POOL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::pool");

/// Number of workers used by the daemon.
pub const DEFAULT_WORKERS: usize = 3;

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run { task: &'static str, job: Job },
    Stop,
}

/// Errors surfaced by the worker pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool has shut down and accepts no more work.
    #[error("worker pool is closed")]
    Closed,
    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread: {source}")]
    Spawn {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A worker thread panicked outside a task.
    #[error("worker thread panicked")]
    WorkerPanic,
}

/// Owner of the worker threads.
pub struct WorkerPool {
    handle: PoolHandle,
    workers: Vec<JoinHandle<()>>,
}

/// Cloneable submission side of a [`WorkerPool`].
#[derive(Clone)]
pub struct PoolHandle {
    sender: Sender<Message>,
    closed: Arc<RwLock<bool>>,
}

impl std::fmt::Debug for PoolHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolHandle")
            .field("queued", &self.sender.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers.len())
            .field("handle", &self.handle)
            .finish()
    }
}

impl WorkerPool {
    /// Spawns `size` workers (at least one).
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Spawn`] when a thread cannot be created. Workers
    /// spawned before the failure are stopped and joined.
    pub fn new(size: usize) -> Result<Self, PoolError> {
        let (sender, receiver) = unbounded();
        let mut pool = Self {
            handle: PoolHandle {
                sender,
                closed: Arc::new(RwLock::new(false)),
            },
            workers: Vec::with_capacity(size.max(1)),
        };
        for index in 0..size.max(1) {
            let receiver = receiver.clone();
            let spawned = thread::Builder::new()
                .name(format!("xopend-worker-{index}"))
                .spawn(move || run_worker(&receiver));
            match spawned {
                Ok(worker) => pool.workers.push(worker),
                Err(source) => {
                    // Stopping the partial pool can only fail with a worker
                    // panic, which the spawn error already supersedes.
                    let _ = pool.stop_workers();
                    return Err(PoolError::Spawn { source });
                }
            }
        }
        debug!(target: POOL_TARGET, workers = pool.workers.len(), "worker pool started");
        Ok(pool)
    }

    /// Returns a handle that can submit tasks from any thread.
    #[must_use]
    pub fn handle(&self) -> PoolHandle {
        self.handle.clone()
    }

    /// Number of worker threads.
    #[must_use]
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Closes the pool, runs every pending task, and joins the workers.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::WorkerPanic`] when a worker thread panicked.
    pub fn shutdown(mut self) -> Result<(), PoolError> {
        self.stop_workers()
    }

    fn stop_workers(&mut self) -> Result<(), PoolError> {
        {
            let mut closed = self
                .handle
                .closed
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            *closed = true;
            for _ in &self.workers {
                // Receivers outlive this loop because the workers hold them.
                let _ = self.handle.sender.send(Message::Stop);
            }
        }
        let mut result = Ok(());
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                result = Err(PoolError::WorkerPanic);
            }
        }
        debug!(target: POOL_TARGET, "worker pool stopped");
        result
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            let _ = self.stop_workers();
        }
    }
}

impl PoolHandle {
    /// Queues `job` under the label `task`.
    ///
    /// Errors returned by the job are logged by the worker.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Closed`] once the pool has shut down.
    pub fn submit<F, E>(&self, task: &'static str, job: F) -> Result<(), PoolError>
    where
        F: FnOnce() -> Result<(), E> + Send + 'static,
        E: Error + Send + 'static,
    {
        let closed = self.closed.read().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return Err(PoolError::Closed);
        }
        let job: Job = Box::new(move || {
            if let Err(error) = job() {
                error!(target: POOL_TARGET, task, error = %error, "background task failed");
            }
        });
        self.sender
            .send(Message::Run { task, job })
            .map_err(|_| PoolError::Closed)?;
        drop(closed);
        debug!(target: POOL_TARGET, task, "background task queued");
        Ok(())
    }

    /// Returns true once the pool no longer accepts work.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.closed.read().unwrap_or_else(PoisonError::into_inner)
    }
}

fn run_worker(receiver: &Receiver<Message>) {
    while let Ok(message) = receiver.recv() {
        match message {
            Message::Run { task, job } => {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                    error!(
                        target: POOL_TARGET,
                        task,
                        panic = %panic_message(payload.as_ref()),
                        "background task panicked"
                    );
                } else {
                    debug!(target: POOL_TARGET, task, "background task finished");
                }
            }
            Message::Stop => break,
        }
    }
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
