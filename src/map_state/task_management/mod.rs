//! # Task Management System
//!
//! This module provides the task pipeline that keeps region I/O and tile
//! rendering off the controller thread while applying their results back on it
//! in a fixed order.
//!
//! ## Architecture Overview
//!
//! - `TaskManager`: Owns the worker thread and the pending queue
//! - `Task`: A unit of work, split into a `Job` and a `Completion` at dispatch
//! - `PendingQueue`: The ordered list of tasks whose completion has not run yet
//!
//! A single dedicated worker thread receives jobs over a channel and runs them in
//! the order they were submitted. Every job reports its outcome on its own
//! one-shot channel, which the pending queue holds as the task's result handle.
//!
//! ## Ordering
//!
//! For tasks A and B with A submitted first:
//! 1. A's job is run before B's job
//! 2. A's completion runs before B's completion
//! 3. B's job may finish, and even be ready, before A's completion runs
//!
//! The third point is what makes the queue necessary. `drain_one()` only ever looks
//! at the head of the queue. If the head's result has not arrived, nothing behind it
//! is completed, however many later results are already waiting. This can be pictured
//! as:
//!
//! ```text
//! submit(T1) submit(T2) submit(T3)
//! worker:     T1.run  T2.run  T3.run
//! controller:       T1.complete    T2.complete T3.complete
//! ```
//!
//! ## Faults
//! - A job that panics is caught on the worker; its completion still runs and
//!   receives `Err(TaskFault::Panicked)`
//! - A completion that panics is caught and logged; the task is still removed
//! - Submitting after `shutdown()` logs an error and drops the task
//!
//! ## Example Usage
//! ```rust
//! use region_map::map_state::task_management::{TaskManager, TaskManagerConfig};
//!
//! let mut task_manager = TaskManager::new(TaskManagerConfig::default()).unwrap();
//!
//! // In the main loop, complete whatever has finished:
//! while !task_manager.drain_one() {}
//!
//! // On exit:
//! task_manager.shutdown();
//! ```

pub mod task;

use std::{
    collections::BTreeMap,
    io,
    panic::{self, AssertUnwindSafe},
    sync::mpsc::{self, Receiver, Sender, TryRecvError},
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{debug, error, info};
use task::{Completion, Job, Task, TaskFault};

/// Pending-queue depth above which a diagnostic dump is logged.
pub const HIGH_WATER_MARK: usize = 500;
/// Drain attempts made by `shutdown()` before giving up.
pub const SHUTDOWN_ATTEMPTS: u32 = 50;
/// Pause between unproductive drain attempts during `shutdown()`.
pub const SHUTDOWN_DELAY: Duration = Duration::from_millis(5);

/// Completed entries at the front of the queue before they are compacted away.
const COMPACT_THRESHOLD: usize = 64;

/// A job packaged for the worker thread.
type Envelope = Box<dyn FnOnce() + Send>;

/// Tunables of a `TaskManager`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskManagerConfig {
    /// Queue depth that triggers the outstanding-task diagnostic.
    pub high_water_mark: usize,
    /// Drain attempts made by `shutdown()`.
    pub shutdown_attempts: u32,
    /// Pause between unproductive drain attempts during `shutdown()`.
    pub shutdown_delay: Duration,
}

impl Default for TaskManagerConfig {
    fn default() -> Self {
        TaskManagerConfig {
            high_water_mark: HIGH_WATER_MARK,
            shutdown_attempts: SHUTDOWN_ATTEMPTS,
            shutdown_delay: SHUTDOWN_DELAY,
        }
    }
}

/// A submitted task waiting for its completion to run.
trait PendingTask {
    fn kind(&self) -> &'static str;

    /// Whether the job's outcome has arrived. Also true once the worker is gone.
    fn is_done(&mut self) -> bool;

    /// Runs the completion. Only called after `is_done()` returned true.
    fn complete(self: Box<Self>);
}

struct Pending<C: Completion> {
    kind: &'static str,
    completion: C,
    result: Receiver<Result<C::Output, TaskFault>>,
    outcome: Option<Result<C::Output, TaskFault>>,
}

impl<C: Completion> PendingTask for Pending<C> {
    fn kind(&self) -> &'static str {
        self.kind
    }

    fn is_done(&mut self) -> bool {
        if self.outcome.is_some() {
            return true;
        }
        match self.result.try_recv() {
            Ok(outcome) => self.outcome = Some(outcome),
            Err(TryRecvError::Empty) => return false,
            Err(TryRecvError::Disconnected) => self.outcome = Some(Err(TaskFault::WorkerGone)),
        }
        true
    }

    fn complete(self: Box<Self>) {
        let outcome = self.outcome.unwrap_or(Err(TaskFault::WorkerGone));
        if let Err(fault) = &outcome {
            error!("task {} failed: {}", self.kind, fault);
        }
        self.completion.on_complete(outcome);
    }
}

/// Tasks in submission order, with a cursor at the first one not yet completed.
///
/// Entries before `head` have completed and are `None`. Completion only ever
/// advances `head`, so a later task can never overtake an earlier one.
#[derive(Default)]
struct PendingQueue {
    entries: Vec<Option<Box<dyn PendingTask>>>,
    head: usize,
}

impl PendingQueue {
    fn len(&self) -> usize {
        self.entries.len() - self.head
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&mut self, task: Box<dyn PendingTask>) {
        self.entries.push(Some(task));
    }

    fn head_mut(&mut self) -> Option<&mut Box<dyn PendingTask>> {
        self.entries.get_mut(self.head)?.as_mut()
    }

    fn pop_head(&mut self) -> Option<Box<dyn PendingTask>> {
        let task = self.entries.get_mut(self.head)?.take();
        self.head += 1;

        if self.head == self.entries.len() {
            self.entries.clear();
            self.head = 0;
        } else if self.head >= COMPACT_THRESHOLD && self.head * 2 >= self.entries.len() {
            self.entries.drain(..self.head);
            self.head = 0;
        }
        task
    }

    fn iter(&self) -> impl Iterator<Item = &Box<dyn PendingTask>> {
        self.entries[self.head..].iter().flatten()
    }
}

/// Runs jobs on one background thread and their completions, in order, on the
/// thread that drains it.
///
/// # Thread Safety
/// - The manager itself stays on the controller thread (it is not `Send`)
/// - Only the controller calls `drain_one()`, so only it runs completions
/// - Jobs never run concurrently with each other
pub struct TaskManager {
    job_sender: Option<Sender<Envelope>>,
    worker: Option<JoinHandle<()>>,
    pending: PendingQueue,
    config: TaskManagerConfig,
    closed: bool,
    diagnostics_armed: bool,
    diagnostic_dumps: usize,
}

impl TaskManager {
    /// Creates a task manager and starts its worker thread.
    ///
    /// # Errors
    /// Fails if the worker thread cannot be spawned.
    pub fn new(config: TaskManagerConfig) -> io::Result<Self> {
        let (job_sender, job_receiver) = mpsc::channel::<Envelope>();

        let worker = thread::Builder::new()
            .name("map-task-worker".to_string())
            .spawn(move || {
                while let Ok(envelope) = job_receiver.recv() {
                    envelope();
                }
                debug!("task worker exiting");
            })?;

        Ok(TaskManager {
            job_sender: Some(job_sender),
            worker: Some(worker),
            pending: PendingQueue::default(),
            config,
            closed: false,
            diagnostics_armed: true,
            diagnostic_dumps: 0,
        })
    }

    /// Submits a task.
    ///
    /// Returns whether the task was accepted into the pending queue. A task submitted
    /// after `shutdown()` is logged and dropped; a task whose `is_duplicate()` is true
    /// is dropped without running. If the worker is gone the task is still queued and
    /// its completion receives `TaskFault::WorkerGone`.
    pub fn submit<T: Task>(&mut self, task: T) -> bool {
        let kind = task.kind();
        if self.closed {
            error!("cannot add task {} to closed task manager", kind);
            return false;
        }
        if task.is_duplicate() {
            debug!("dropping duplicate task {}", kind);
            return false;
        }

        let (job, completion) = task.split();
        let (result_sender, result) = mpsc::channel();
        let envelope: Envelope = Box::new(move || {
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| job.run())).map_err(TaskFault::from_panic);
            // the manager may have given up on this task during shutdown
            let _ = result_sender.send(outcome);
        });

        // a send failure drops the envelope and with it the result sender,
        // so the completion sees WorkerGone
        let sent = self
            .job_sender
            .as_ref()
            .is_some_and(|sender| sender.send(envelope).is_ok());
        if !sent {
            error!("task worker is gone, task {} will not run", kind);
        }

        self.pending.push(Box::new(Pending {
            kind,
            completion,
            result,
            outcome: None,
        }));
        self.check_high_water_mark();
        true
    }

    fn check_high_water_mark(&mut self) {
        if self.pending.len() <= self.config.high_water_mark {
            self.diagnostics_armed = true;
        } else if self.diagnostics_armed {
            self.diagnostics_armed = false;
            self.diagnostic_dumps += 1;
            error!(
                "task queue went over {} tasks, starting diagnostic",
                self.config.high_water_mark
            );
            self.log_outstanding_by_kind();
            error!("end of diagnostic");
        }
    }

    /// Completes the task at the head of the queue if its job has finished.
    ///
    /// Returns `true` when nothing was completed, either because the queue is
    /// empty or because the head task is still running. Callers use this to decide
    /// whether to back off before polling again.
    pub fn drain_one(&mut self) -> bool {
        let Some(head) = self.pending.head_mut() else {
            return true;
        };
        if !head.is_done() {
            return true;
        }

        if let Some(task) = self.pending.pop_head() {
            let kind = task.kind();
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task.complete())) {
                error!(
                    "completion of task {} panicked: {}",
                    kind,
                    TaskFault::from_panic(payload)
                );
            }
        }
        if self.pending.len() <= self.config.high_water_mark {
            self.diagnostics_armed = true;
        }
        false
    }

    /// Drains until the queue is empty or `max_attempts` calls made no progress.
    ///
    /// Sleeps `delay` after every unproductive call. Returns whether the queue emptied.
    pub fn drain_until_empty_or(&mut self, max_attempts: u32, delay: Duration) -> bool {
        let mut attempts = max_attempts;
        while !self.pending.is_empty() && attempts > 0 {
            if self.drain_one() {
                thread::sleep(delay);
                attempts -= 1;
            }
        }
        self.pending.is_empty()
    }

    /// Number of tasks whose completion has not run yet.
    pub fn outstanding_count(&self) -> usize {
        self.pending.len()
    }

    /// Outstanding tasks counted by `Task::kind()`.
    pub fn outstanding_by_kind(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for task in self.pending.iter() {
            *counts.entry(task.kind()).or_insert(0) += 1;
        }
        counts
    }

    fn log_outstanding_by_kind(&self) {
        for (kind, count) in self.outstanding_by_kind() {
            info!("waiting for {} {} to finish...", count, kind);
        }
    }

    /// How many times the high-water-mark diagnostic has fired.
    pub fn diagnostic_dumps(&self) -> usize {
        self.diagnostic_dumps
    }

    /// Whether `shutdown()` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Stops accepting tasks and drains what is outstanding.
    ///
    /// The drain is bounded by the configured attempts and delay. If tasks remain
    /// afterwards the worker is left behind rather than joined, so a wedged job
    /// cannot hang the controller. Returns whether everything completed.
    pub fn shutdown(&mut self) -> bool {
        if self.closed {
            return self.pending.is_empty();
        }

        self.log_outstanding_by_kind();
        self.closed = true;
        // the worker finishes the jobs already queued, then exits
        self.job_sender = None;

        let drained =
            self.drain_until_empty_or(self.config.shutdown_attempts, self.config.shutdown_delay);
        if drained {
            if let Some(worker) = self.worker.take() {
                if worker.join().is_err() {
                    error!("task worker panicked during shutdown");
                }
            }
        } else {
            error!(
                "task manager shut down with {} tasks outstanding",
                self.pending.len()
            );
            self.log_outstanding_by_kind();
        }
        drained
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        if !self.closed {
            self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    struct Echo(u32);

    impl Job for Echo {
        type Output = u32;

        fn run(self) -> u32 {
            self.0
        }
    }

    type Outcomes = Rc<RefCell<Vec<Result<u32, TaskFault>>>>;

    struct Record(Outcomes);

    impl Completion for Record {
        type Output = u32;

        fn on_complete(self, outcome: Result<u32, TaskFault>) {
            self.0.borrow_mut().push(outcome);
        }
    }

    struct EchoTask(u32, Outcomes);

    impl Task for EchoTask {
        type Job = Echo;
        type Completion = Record;

        fn split(self) -> (Echo, Record) {
            (Echo(self.0), Record(self.1))
        }
    }

    fn config(high_water_mark: usize) -> TaskManagerConfig {
        TaskManagerConfig {
            high_water_mark,
            ..TaskManagerConfig::default()
        }
    }

    #[test]
    fn queue_compacts_without_reordering() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut manager = TaskManager::new(config(HIGH_WATER_MARK)).unwrap();
        for i in 0..200 {
            manager.submit(EchoTask(i, log.clone()));
        }
        assert!(manager.drain_until_empty_or(1000, Duration::from_millis(1)));
        assert_eq!(*log.borrow(), (0..200).map(Ok).collect::<Vec<_>>());
        assert!(manager.pending.entries.is_empty());
    }

    #[test]
    fn diagnostic_fires_once_per_crossing() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut manager = TaskManager::new(config(4)).unwrap();
        for i in 0..10 {
            manager.submit(EchoTask(i, log.clone()));
        }
        assert_eq!(manager.diagnostic_dumps(), 1);

        assert!(manager.drain_until_empty_or(1000, Duration::from_millis(1)));
        for i in 0..10 {
            manager.submit(EchoTask(i, log.clone()));
        }
        assert_eq!(manager.diagnostic_dumps(), 2);
    }

    #[test]
    fn outstanding_counts_by_kind() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut manager = TaskManager::new(config(HIGH_WATER_MARK)).unwrap();
        manager.submit(EchoTask(1, log.clone()));
        manager.submit(EchoTask(2, log.clone()));

        let counts = manager.outstanding_by_kind();
        assert_eq!(counts.values().sum::<usize>(), manager.outstanding_count());
        assert!(manager.shutdown());
        assert!(manager.outstanding_by_kind().is_empty());
    }

    #[test]
    fn lost_worker_still_queues_and_completes_with_fault() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut manager = TaskManager::new(config(HIGH_WATER_MARK)).unwrap();
        manager.job_sender = None;

        assert!(manager.submit(EchoTask(7, log.clone())));
        assert_eq!(manager.outstanding_count(), 1);

        assert!(!manager.drain_one());
        assert_eq!(*log.borrow(), vec![Err(TaskFault::WorkerGone)]);
        assert_eq!(manager.outstanding_count(), 0);
    }
}
