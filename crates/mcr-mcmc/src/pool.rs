use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use mcr_core::{Chain, ErrorInfo, McrError, SamplingEngine, SamplingSession, WorkerId};
use tracing::{debug, info, warn};

use crate::session::{self, WorkerTask};

enum Command {
    Run(WorkerTask),
    Shutdown,
}

enum Event {
    Ready(WorkerId),
    Finished {
        worker: WorkerId,
        result: Result<Chain, McrError>,
    },
}

struct WorkerHandle {
    id: WorkerId,
    commands: Sender<Command>,
    thread: Option<JoinHandle<()>>,
}

/// Fixed-size pool of sampling workers, one OS thread per chain.
///
/// Each worker owns its sampling session for the lifetime of the pool. The
/// pool is released exactly once, either through [`WorkerPool::release`] or
/// when it is dropped on an early return.
pub struct WorkerPool {
    workers: Vec<WorkerHandle>,
    events: Receiver<Event>,
    released: bool,
}

impl WorkerPool {
    /// Spawns `n_chain` workers and blocks until every one reports ready.
    pub fn acquire(n_chain: usize, engine: Arc<dyn SamplingEngine>) -> Result<Self, McrError> {
        if n_chain == 0 {
            return Err(McrError::Config(ErrorInfo::new(
                "pool-size",
                "worker pool needs at least one worker",
            )));
        }
        let (events_tx, events_rx) = unbounded();
        let mut pool = WorkerPool {
            workers: Vec::with_capacity(n_chain),
            events: events_rx,
            released: false,
        };
        for index in 0..n_chain {
            let id = WorkerId::from_raw(index);
            let (commands_tx, commands_rx) = unbounded();
            let events = events_tx.clone();
            let engine = Arc::clone(&engine);
            let thread = thread::Builder::new()
                .name(format!("mcr-worker-{index}"))
                .spawn(move || worker_loop(id, engine, commands_rx, events))
                .map_err(|err| {
                    McrError::Worker(
                        ErrorInfo::new("worker-spawn", err.to_string())
                            .with_context("worker", index.to_string()),
                    )
                })?;
            pool.workers.push(WorkerHandle {
                id,
                commands: commands_tx,
                thread: Some(thread),
            });
        }
        drop(events_tx);

        let mut ready = 0;
        while ready < n_chain {
            match pool.events.recv() {
                Ok(Event::Ready(worker)) => {
                    debug!(%worker, "worker ready");
                    ready += 1;
                }
                Ok(Event::Finished { worker, .. }) => {
                    warn!(%worker, "unexpected result before dispatch");
                }
                Err(_) => return Err(disconnected()),
            }
        }
        info!(workers = n_chain, "worker pool ready");
        Ok(pool)
    }

    /// Identities of the workers in dispatch order.
    pub fn worker_ids(&self) -> Vec<WorkerId> {
        self.workers.iter().map(|worker| worker.id).collect()
    }

    /// Number of workers.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Returns true when the pool has no workers.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Sends one task to every worker and waits for all of them.
    ///
    /// Results come back in worker order. When any worker fails, the round
    /// still completes on every worker and the first error by worker index
    /// is returned.
    pub fn dispatch(&self, tasks: Vec<WorkerTask>) -> Result<Vec<Chain>, McrError> {
        if tasks.len() != self.workers.len() {
            return Err(McrError::Worker(
                ErrorInfo::new("dispatch-size", "one task per worker is required")
                    .with_context("tasks", tasks.len().to_string())
                    .with_context("workers", self.workers.len().to_string()),
            ));
        }
        for (worker, task) in self.workers.iter().zip(tasks) {
            worker.commands.send(Command::Run(task)).map_err(|_| {
                McrError::Worker(
                    ErrorInfo::new("worker-send", "worker stopped accepting tasks")
                        .with_context("worker", worker.id.to_string()),
                )
            })?;
        }

        let mut slots: Vec<Option<Result<Chain, McrError>>> =
            (0..self.workers.len()).map(|_| None).collect();
        let mut pending = self.workers.len();
        while pending > 0 {
            match self.events.recv() {
                Ok(Event::Finished { worker, result }) => {
                    if let Some(slot) = slots.get_mut(worker.index()) {
                        if slot.replace(result).is_none() {
                            pending -= 1;
                        }
                    }
                }
                Ok(Event::Ready(worker)) => warn!(%worker, "late ready signal ignored"),
                Err(_) => return Err(disconnected()),
            }
        }
        slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| Err(disconnected())))
            .collect()
    }

    /// Terminates every worker.
    pub fn release(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        for worker in &self.workers {
            let _ = worker.commands.send(Command::Shutdown);
        }
        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                if thread.join().is_err() {
                    warn!(worker = %worker.id, "worker thread panicked during shutdown");
                }
            }
        }
        info!(workers = self.workers.len(), "worker pool released");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    id: WorkerId,
    engine: Arc<dyn SamplingEngine>,
    commands: Receiver<Command>,
    events: Sender<Event>,
) {
    let mut slot: Option<Box<dyn SamplingSession>> = None;
    if events.send(Event::Ready(id)).is_err() {
        return;
    }
    for command in commands {
        match command {
            Command::Shutdown => break,
            Command::Run(task) => {
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    session::execute(engine.as_ref(), &mut slot, id, task)
                }))
                .unwrap_or_else(|payload| Err(panicked(id, payload)));
                if events.send(Event::Finished { worker: id, result }).is_err() {
                    break;
                }
            }
        }
    }
    drop(slot);
    debug!(worker = %id, "worker stopped");
}

fn panicked(worker: WorkerId, payload: Box<dyn std::any::Any + Send>) -> McrError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|msg| msg.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "worker panicked".to_string());
    McrError::Worker(
        ErrorInfo::new("worker-panic", message).with_context("worker", worker.index().to_string()),
    )
}

fn disconnected() -> McrError {
    McrError::Worker(ErrorInfo::new(
        "worker-disconnected",
        "worker channel closed before the round completed",
    ))
}
