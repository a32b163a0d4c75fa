//! Derived-signal searches over the router graph.
//!
//! A consumer about to go to sleep asks: combine everything upstream of
//! my input port that could make packets appear (or everything downstream
//! of my output port that could make space appear) into one signal, and
//! sign me up to be woken when any of it activates. The walk stops at
//! back-pressure boundaries (ports where the push/pull discipline flips,
//! or dead ends) and degrades the answer to busy there, because past
//! such a port no notifier can speak for the branch.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::element::{Element, ElementId, EMPTY_NOTIFIER, FULL_NOTIFIER};
use crate::error::NotifyResult;
use crate::notifier::{Notifier, SearchOp};
use crate::router::{ElementFilter, Router};
use crate::signal::NotifierSignal;
use crate::task::Task;

/// Accumulating search state: the derived signal so far and every
/// notifier that contributed to it.
struct NotifierSearch<'r> {
    router: &'r Router,
    name: &'static str,
    signal: NotifierSignal,
    notifiers: Vec<Arc<dyn Notifier>>,
    need_pass2: bool,
    pass2: bool,
}

impl<'r> NotifierSearch<'r> {
    fn new(router: &'r Router, name: &'static str) -> Self {
        Self {
            router,
            name,
            signal: NotifierSignal::idle(),
            notifiers: Vec::new(),
            need_pass2: false,
            pass2: false,
        }
    }

    fn record(&mut self, notifier: Arc<dyn Notifier>) {
        let already = self
            .notifiers
            .iter()
            .any(|seen| std::ptr::addr_eq(Arc::as_ptr(seen), Arc::as_ptr(&notifier)));
        if !already {
            self.notifiers.push(notifier);
        }
    }
}

impl ElementFilter for NotifierSearch<'_> {
    fn check_match(&mut self, element: &dyn Element, is_output: bool, port: usize) -> bool {
        if let Some(notifier) = element.notifier(self.name) {
            if !notifier.signal().initialized() {
                if let Err(err) = notifier.initialize(self.router) {
                    warn!(
                        element = element.class_name(),
                        error = %err,
                        "notifier initialization failed, degrading search to busy"
                    );
                    self.signal = NotifierSignal::busy();
                    return true;
                }
            }
            self.signal += &notifier.signal();
            let search_op = notifier.search_op();
            self.record(notifier);
            match search_op {
                SearchOp::Stop => true,
                SearchOp::Continue => false,
                SearchOp::ContinueWake => {
                    if self.pass2 {
                        false
                    } else {
                        self.need_pass2 = true;
                        true
                    }
                }
            }
        } else if element.port_active(is_output, port)
            || element.port_flow(is_output, port).is_empty()
        {
            // Push/pull discipline flips here, or the branch dead-ends:
            // no notifier past this point can speak for it.
            self.signal = NotifierSignal::busy();
            true
        } else {
            false
        }
    }
}

fn run_walk(
    router: &Router,
    origin: ElementId,
    port: usize,
    downstream: bool,
    search: &mut NotifierSearch<'_>,
) -> NotifyResult<Vec<ElementId>> {
    if downstream {
        router.downstream_elements(origin, port, search)
    } else {
        router.upstream_elements(origin, port, search)
    }
}

fn derived_signal(
    router: &Router,
    origin: ElementId,
    port: usize,
    name: &'static str,
    downstream: bool,
    task: Option<&Arc<Task>>,
    dependent: Option<&Arc<dyn Notifier>>,
) -> NotifierSignal {
    let mut search = NotifierSearch::new(router, name);
    let mut outcome = run_walk(router, origin, port, downstream, &mut search);

    // Wake-only notifiers held their branch back on the first pass; give
    // them a second one when something else already made the result
    // non-idle.
    if outcome.is_ok() && search.signal != NotifierSignal::idle() && search.need_pass2 {
        search.pass2 = true;
        outcome = run_walk(router, origin, port, downstream, &mut search);
    }

    if outcome.is_err() || search.signal == NotifierSignal::idle() {
        debug!(
            %origin,
            port,
            name,
            failed = outcome.is_err(),
            "search found nothing to wait on"
        );
        return NotifierSignal::uninitialized();
    }

    let mut signal = search.signal;
    if let Some(task) = task {
        for notifier in &search.notifiers {
            if notifier.add_listener(task).is_err() {
                signal = NotifierSignal::busy();
            }
        }
    }
    if let Some(dependent) = dependent {
        for notifier in &search.notifiers {
            if notifier.add_dependent(dependent).is_err() {
                signal = NotifierSignal::busy();
            }
        }
    }

    debug!(
        %origin,
        port,
        name,
        notifiers = search.notifiers.len(),
        signal = %signal,
        "derived signal assembled"
    );
    signal
}

/// Combines every empty-notifier upstream of `origin`'s input `port`
/// into one derived signal, optionally registering `task` as a listener
/// and `dependent` as a dependent notifier on each of them.
///
/// Returns the uninitialized signal when the walk fails or finds nothing
/// to wait on; callers must then always try. A back-pressure boundary
/// along the way yields the busy signal for the same reason.
pub fn upstream_empty_signal(
    router: &Router,
    origin: ElementId,
    port: usize,
    task: Option<&Arc<Task>>,
    dependent: Option<&Arc<dyn Notifier>>,
) -> NotifierSignal {
    derived_signal(router, origin, port, EMPTY_NOTIFIER, false, task, dependent)
}

/// Combines every full-notifier downstream of `origin`'s output `port`,
/// the mirror image of [`upstream_empty_signal`].
pub fn downstream_full_signal(
    router: &Router,
    origin: ElementId,
    port: usize,
    task: Option<&Arc<Task>>,
    dependent: Option<&Arc<dyn Notifier>>,
) -> NotifierSignal {
    derived_signal(router, origin, port, FULL_NOTIFIER, true, task, dependent)
}
