//! Notifiers: named activity signals with sleep/wakeup support.
//!
//! A [`Notifier`] ties an activity signal to the element publishing it.
//! The passive flavor is just the signal; the active flavor additionally
//! keeps a listener list and wakes it whenever the signal makes an
//! inactive-to-active transition. Listeners are either tasks (rescheduled
//! through the scheduler) or dependent notifiers (activated in cascade).
//!
//! All listener bookkeeping runs on the router's dataflow worker. Only the
//! signal bits themselves may be touched from other threads.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, error, trace};

use crate::error::{NotifyError, NotifyResult};
use crate::router::Router;
use crate::signal::NotifierSignal;
use crate::task::Task;

/// How a graph walk proceeds after recording a notifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchOp {
    /// The notifier fully describes this branch; stop walking it.
    Stop,
    /// Record the notifier and keep walking through the element.
    Continue,
    /// Contribute only when the walk found back-pressure elsewhere; on
    /// the first pass this stops the branch, on the second it continues.
    ContinueWake,
}

/// An activity signal published by an element under a capability name.
pub trait Notifier: Send + Sync {
    /// The current signal, by value.
    fn signal(&self) -> NotifierSignal;

    fn search_op(&self) -> SearchOp;

    /// Obtains a basic signal from the router if none is held yet.
    /// Idempotent; fails only when the router's signal budget is spent.
    fn initialize(&self, router: &Router) -> NotifyResult<()>;

    /// Activates or deactivates the signal. Active notifiers wake their
    /// listeners on the inactive-to-active transition; deactivation never
    /// performs callbacks.
    fn set_active(&self, active: bool);

    fn wake(&self) {
        self.set_active(true);
    }

    fn sleep(&self) {
        self.set_active(false);
    }

    /// Registers `task` for wakeup. Default does nothing; only active
    /// notifiers track listeners.
    fn add_listener(&self, task: &Arc<Task>) -> NotifyResult<()> {
        let _ = task;
        Ok(())
    }

    /// Undoes a prior `add_listener`. Removing a task that was never
    /// added does nothing.
    fn remove_listener(&self, task: &Arc<Task>) {
        let _ = task;
    }

    /// Registers another notifier to be activated whenever this one
    /// becomes active. Default does nothing.
    fn add_dependent(&self, notifier: &Arc<dyn Notifier>) -> NotifyResult<()> {
        let _ = notifier;
        Ok(())
    }

    /// Undoes a prior `add_dependent`.
    fn remove_dependent(&self, notifier: &Arc<dyn Notifier>) {
        let _ = notifier;
    }
}

/// A notifier without listeners of its own.
///
/// Useful for elements whose activity is only ever observed through
/// searches, or as the leaf of a dependent-signal cascade.
pub struct PassiveNotifier {
    signal: Mutex<NotifierSignal>,
    search_op: SearchOp,
}

impl PassiveNotifier {
    pub fn new(search_op: SearchOp) -> Self {
        Self {
            signal: Mutex::new(NotifierSignal::uninitialized()),
            search_op,
        }
    }
}

impl Default for PassiveNotifier {
    fn default() -> Self {
        Self::new(SearchOp::Stop)
    }
}

impl Notifier for PassiveNotifier {
    fn signal(&self) -> NotifierSignal {
        self.signal.lock().clone()
    }

    fn search_op(&self) -> SearchOp {
        self.search_op
    }

    fn initialize(&self, router: &Router) -> NotifyResult<()> {
        let mut signal = self.signal.lock();
        if !signal.initialized() {
            *signal = router.new_basic_signal()?;
        }
        Ok(())
    }

    fn set_active(&self, active: bool) {
        self.signal.lock().set_active(active);
    }
}

/// Listener storage.
///
/// The overwhelmingly common case is one task and no dependents, which
/// stays in the inline slot. Growing past that allocates the two
/// partition vectors; shrinking degrades back so no heap allocation is
/// retained by an empty or single-task list.
enum Listeners {
    Empty,
    Single(Weak<Task>),
    Many {
        tasks: Vec<Weak<Task>>,
        dependents: Vec<Weak<dyn Notifier>>,
    },
}

impl Listeners {
    fn counts(&self) -> (usize, usize) {
        match self {
            Listeners::Empty => (0, 0),
            Listeners::Single(_) => (1, 0),
            Listeners::Many { tasks, dependents } => (tasks.len(), dependents.len()),
        }
    }

    fn from_parts(mut tasks: Vec<Weak<Task>>, dependents: Vec<Weak<dyn Notifier>>) -> Self {
        if dependents.is_empty() {
            if tasks.is_empty() {
                return Listeners::Empty;
            }
            if tasks.len() == 1 {
                if let Some(task) = tasks.pop() {
                    return Listeners::Single(task);
                }
            }
        }
        Listeners::Many { tasks, dependents }
    }
}

/// A single listener-list edit.
enum Change<'a> {
    AddTask(&'a Arc<Task>),
    RemoveTask(&'a Arc<Task>),
    AddDependent(&'a Arc<dyn Notifier>),
    RemoveDependent(&'a Arc<dyn Notifier>),
}

fn keep_task(out: &mut Vec<Weak<Task>>, existing: &Weak<Task>, change: &Change<'_>, known: &mut bool) {
    if existing.strong_count() == 0 {
        return;
    }
    match change {
        Change::AddTask(task) if std::ptr::eq(existing.as_ptr(), Arc::as_ptr(task)) => {
            *known = true;
            out.push(existing.clone());
        }
        Change::RemoveTask(task) if std::ptr::eq(existing.as_ptr(), Arc::as_ptr(task)) => {}
        _ => out.push(existing.clone()),
    }
}

fn keep_dependent(
    out: &mut Vec<Weak<dyn Notifier>>,
    existing: &Weak<dyn Notifier>,
    change: &Change<'_>,
    known: &mut bool,
) {
    if existing.strong_count() == 0 {
        return;
    }
    match change {
        Change::AddDependent(dep) if std::ptr::addr_eq(existing.as_ptr(), Arc::as_ptr(dep)) => {
            *known = true;
            out.push(existing.clone());
        }
        Change::RemoveDependent(dep)
            if std::ptr::addr_eq(existing.as_ptr(), Arc::as_ptr(dep)) => {}
        _ => out.push(existing.clone()),
    }
}

/// A notifier that wakes its listeners when it becomes active.
///
/// Listener references are weak in both directions of use: the notifier
/// never keeps a task or a dependent notifier alive, and entries whose
/// owner has gone away are pruned on the next list edit.
pub struct ActiveNotifier {
    signal: Mutex<NotifierSignal>,
    search_op: SearchOp,
    listeners: Mutex<Listeners>,
    wakes: AtomicU64,
}

impl ActiveNotifier {
    pub fn new(search_op: SearchOp) -> Self {
        Self {
            signal: Mutex::new(NotifierSignal::uninitialized()),
            search_op,
            listeners: Mutex::new(Listeners::Empty),
            wakes: AtomicU64::new(0),
        }
    }

    /// Number of inactive-to-active transitions so far.
    pub fn wake_count(&self) -> u64 {
        self.wakes.load(Ordering::Relaxed)
    }

    /// The live listener tasks, in registration order.
    pub fn listeners(&self) -> Vec<Arc<Task>> {
        match &*self.listeners.lock() {
            Listeners::Empty => Vec::new(),
            Listeners::Single(task) => task.upgrade().into_iter().collect(),
            Listeners::Many { tasks, .. } => {
                tasks.iter().filter_map(Weak::upgrade).collect()
            }
        }
    }

    fn listener_change(&self, change: Change<'_>) -> NotifyResult<()> {
        let mut guard = self.listeners.lock();

        // Inline fast path: first task listener on an empty list.
        if let (Listeners::Empty, Change::AddTask(task)) = (&*guard, &change) {
            *guard = Listeners::Single(Arc::downgrade(*task));
            return Ok(());
        }

        let (task_count, dependent_count) = guard.counts();
        let mut tasks: Vec<Weak<Task>> = Vec::new();
        let mut dependents: Vec<Weak<dyn Notifier>> = Vec::new();
        if tasks.try_reserve(task_count + 1).is_err()
            || dependents.try_reserve(dependent_count + 1).is_err()
        {
            error!("out of memory growing notifier listener list");
            return Err(NotifyError::OutOfMemory);
        }

        let mut known = false;
        match &*guard {
            Listeners::Empty => {}
            Listeners::Single(existing) => keep_task(&mut tasks, existing, &change, &mut known),
            Listeners::Many {
                tasks: existing_tasks,
                dependents: existing_dependents,
            } => {
                for existing in existing_tasks {
                    keep_task(&mut tasks, existing, &change, &mut known);
                }
                for existing in existing_dependents {
                    keep_dependent(&mut dependents, existing, &change, &mut known);
                }
            }
        }

        match change {
            Change::AddTask(task) if !known => tasks.push(Arc::downgrade(task)),
            Change::AddDependent(dep) if !known => dependents.push(Arc::downgrade(dep)),
            _ => {}
        }

        debug!(
            tasks = tasks.len(),
            dependents = dependents.len(),
            "listener list updated"
        );
        *guard = Listeners::from_parts(tasks, dependents);
        Ok(())
    }

    fn wake_listeners(&self) {
        let (tasks, dependents) = {
            match &*self.listeners.lock() {
                Listeners::Empty => return,
                Listeners::Single(task) => (vec![task.clone()], Vec::new()),
                Listeners::Many { tasks, dependents } => (tasks.clone(), dependents.clone()),
            }
        };
        for task in &tasks {
            if let Some(task) = task.upgrade() {
                task.reschedule();
            }
        }
        for dependent in &dependents {
            if let Some(dependent) = dependent.upgrade() {
                dependent.set_active(true);
            }
        }
    }
}

impl Default for ActiveNotifier {
    fn default() -> Self {
        Self::new(SearchOp::Stop)
    }
}

impl Notifier for ActiveNotifier {
    fn signal(&self) -> NotifierSignal {
        self.signal.lock().clone()
    }

    fn search_op(&self) -> SearchOp {
        self.search_op
    }

    fn initialize(&self, router: &Router) -> NotifyResult<()> {
        let mut signal = self.signal.lock();
        if !signal.initialized() {
            *signal = router.new_basic_signal()?;
        }
        Ok(())
    }

    fn set_active(&self, active: bool) {
        let signal = self.signal.lock().clone();
        if active {
            if signal.set_active(true) {
                self.wakes.fetch_add(1, Ordering::Relaxed);
                trace!(signal = %signal, "notifier activated, waking listeners");
                self.wake_listeners();
            }
        } else {
            signal.set_active(false);
        }
    }

    fn add_listener(&self, task: &Arc<Task>) -> NotifyResult<()> {
        self.listener_change(Change::AddTask(task))
    }

    fn remove_listener(&self, task: &Arc<Task>) {
        let _ = self.listener_change(Change::RemoveTask(task));
    }

    fn add_dependent(&self, notifier: &Arc<dyn Notifier>) -> NotifyResult<()> {
        self.listener_change(Change::AddDependent(notifier))
    }

    fn remove_dependent(&self, notifier: &Arc<dyn Notifier>) {
        let _ = self.listener_change(Change::RemoveDependent(notifier));
    }
}
