//! # Task System Core Traits
//!
//! This module defines the building blocks of the task pipeline: a unit of work
//! split into a background half and a controller half.
//!
//! ## Core Components
//! - `Task`: What a producer submits. Carries the duplicate check and splits itself
//!   into a `Job` and a `Completion` at dispatch.
//! - `Job`: The background half. Moved to the worker thread and run there.
//! - `Completion`: The controller half. Stays on the controller thread and receives
//!   the job's output once every earlier task has completed.
//! - `TaskFault`: Why a job produced no output.
//!
//! ## Task Lifecycle
//! 1. A `Task` is submitted via `TaskManager::submit()`
//! 2. `is_duplicate()` runs on the submitting thread; duplicates are dropped
//! 3. The task is split; the `Job` goes to the worker, the `Completion` to the pending queue
//! 4. The worker runs `Job::run()` and sends back its output
//! 5. `TaskManager::drain_one()` hands the output to `Completion::on_complete()`
//!    once the task reaches the head of the queue
//!
//! ## Thread Safety
//! - `Job` and its output must be `Send`; they cross to the worker and back
//! - `Completion` need not be `Send`; it can hold controller-only state such as
//!   an `StResource`
//! - Nothing a `Job` owns is visible to the controller until its completion runs

use std::any::Any;

use thiserror::Error;

/// Why a job produced no output.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskFault {
    /// The job panicked on the worker thread.
    #[error("background task panicked: {0}")]
    Panicked(String),

    /// The worker thread went away before reporting a result.
    #[error("background worker is gone")]
    WorkerGone,
}

impl TaskFault {
    /// Builds a fault from a panic payload caught with `catch_unwind`.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|message| message.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        TaskFault::Panicked(message)
    }
}

/// The background half of a task.
///
/// A job owns everything it needs. It runs on the worker thread, after every job
/// submitted before it, and must not touch controller-only state.
pub trait Job: Send + 'static {
    /// What the job hands back to its completion.
    type Output: Send + 'static;

    /// Performs the work. Runs on the worker thread.
    ///
    /// Errors the completion should know about belong in `Output`. A panic is
    /// caught and reported to the completion as `TaskFault::Panicked`.
    fn run(self) -> Self::Output;
}

/// The controller half of a task.
pub trait Completion: 'static {
    /// The output of the matching job.
    type Output: Send + 'static;

    /// Applies the job's outcome to controller state.
    ///
    /// Runs on the controller thread, after the completions of every task submitted
    /// earlier. Must cope with a failed job.
    fn on_complete(self, outcome: Result<Self::Output, TaskFault>);
}

/// A unit of deferred work with a paired completion callback.
///
/// # Example
/// ```
/// use region_map::map_state::task_management::task::{Completion, Job, Task, TaskFault};
///
/// struct Square(u64);
///
/// impl Job for Square {
///     type Output = u64;
///     fn run(self) -> u64 {
///         self.0 * self.0
///     }
/// }
///
/// struct PrintSquare;
///
/// impl Completion for PrintSquare {
///     type Output = u64;
///     fn on_complete(self, outcome: Result<u64, TaskFault>) {
///         if let Ok(square) = outcome {
///             println!("{square}");
///         }
///     }
/// }
///
/// struct SquareTask(u64);
///
/// impl Task for SquareTask {
///     type Job = Square;
///     type Completion = PrintSquare;
///
///     fn split(self) -> (Square, PrintSquare) {
///         (Square(self.0), PrintSquare)
///     }
/// }
/// ```
pub trait Task: Sized + 'static {
    /// The background half.
    type Job: Job;
    /// The controller half.
    type Completion: Completion<Output = <Self::Job as Job>::Output>;

    /// Name used when reporting outstanding tasks by kind.
    fn kind(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Whether an equivalent task is already pending. Runs on the submitting thread
    /// before dispatch; a duplicate is dropped without running.
    fn is_duplicate(&self) -> bool {
        false
    }

    /// Splits the task into its background and controller halves.
    fn split(self) -> (Self::Job, Self::Completion);
}

#[cfg(test)]
mod tests {
    use std::panic;

    use super::*;

    #[test]
    fn fault_keeps_panic_message() {
        let payload = panic::catch_unwind(|| panic!("bad chunk")).unwrap_err();
        assert_eq!(TaskFault::from_panic(payload), TaskFault::Panicked("bad chunk".to_string()));

        let payload = panic::catch_unwind(|| panic!("chunk {}", 7)).unwrap_err();
        assert_eq!(TaskFault::from_panic(payload), TaskFault::Panicked("chunk 7".to_string()));
    }
}
