//! Cooperative task handles consumed by the notifier layer.
//!
//! The scheduler proper lives outside this crate; all the notifier needs
//! is an idempotent [`Task::reschedule`]. The state machine mirrors the
//! usual slot lifecycle so a worker loop can claim and run tasks without
//! losing wakeups that arrive mid-run.

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

const SCHEDULED: u8 = 1;
const RUNNING: u8 = 2;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    Idle = 0,
    Scheduled = SCHEDULED,
    Running = RUNNING,
}

/// A schedulable unit of work owned by an element's consumer loop.
///
/// Shared as `Arc<Task>`; notifiers hold only weak references to it.
pub struct Task {
    state: AtomicU8,
    reschedules: AtomicU64,
}

impl Task {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(TaskState::Idle as u8),
            reschedules: AtomicU64::new(0),
        }
    }

    /// Requests that this task run soon. Safe to call repeatedly; an
    /// already-scheduled task stays scheduled. Returns true when the call
    /// made an idle task runnable.
    #[inline(always)]
    pub fn reschedule(&self) -> bool {
        self.reschedules.fetch_add(1, Ordering::Relaxed);
        let previous = self.state.fetch_or(SCHEDULED, Ordering::AcqRel);
        previous & (SCHEDULED | RUNNING) == 0
    }

    /// Drops a pending schedule request without running the task.
    pub fn unschedule(&self) {
        self.state.fetch_and(!SCHEDULED, Ordering::AcqRel);
    }

    /// Claims the task for execution. Returns false when it was not
    /// scheduled.
    pub fn begin_run(&self) -> bool {
        self.state
            .compare_exchange(
                SCHEDULED,
                RUNNING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Finishes a run. A reschedule that raced in while running is kept;
    /// otherwise the task returns to idle.
    pub fn finish_run(&self) {
        let after = self.state.fetch_and(!RUNNING, Ordering::AcqRel);
        debug_assert!(after & RUNNING != 0, "finish_run without begin_run");
    }

    #[inline(always)]
    pub fn is_scheduled(&self) -> bool {
        self.state.load(Ordering::Acquire) & SCHEDULED != 0
    }

    pub fn state(&self) -> TaskState {
        match self.state.load(Ordering::Acquire) {
            0 => TaskState::Idle,
            s if s & RUNNING != 0 => TaskState::Running,
            _ => TaskState::Scheduled,
        }
    }

    /// Number of reschedule requests seen so far.
    pub fn reschedule_count(&self) -> u64 {
        self.reschedules.load(Ordering::Relaxed)
    }
}

impl Default for Task {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("state", &self.state())
            .field("reschedules", &self.reschedule_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reschedule_is_idempotent() {
        let task = Task::new();
        assert!(task.reschedule());
        assert!(!task.reschedule());
        assert!(task.is_scheduled());
        assert_eq!(task.reschedule_count(), 2);
    }

    #[test]
    fn run_cycle() {
        let task = Task::new();
        assert!(!task.begin_run());

        task.reschedule();
        assert!(task.begin_run());
        assert_eq!(task.state(), TaskState::Running);
        task.finish_run();
        assert_eq!(task.state(), TaskState::Idle);
    }

    #[test]
    fn reschedule_during_run_is_kept() {
        let task = Task::new();
        task.reschedule();
        assert!(task.begin_run());
        assert!(!task.reschedule());
        task.finish_run();
        assert_eq!(task.state(), TaskState::Scheduled);
        assert!(task.begin_run());
        task.finish_run();
    }

    #[test]
    fn unschedule_clears_request() {
        let task = Task::new();
        task.reschedule();
        task.unschedule();
        assert!(!task.is_scheduled());
        assert!(!task.begin_run());
    }
}
