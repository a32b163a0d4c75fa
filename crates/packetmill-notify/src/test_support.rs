//! Reference elements for exercising searches and wakeups.
//!
//! These cover every port discipline the core distinguishes: passive
//! queues with empty/full notifiers, pull sources and sinks, a
//! transparent mux, a push-through pipe (the classic back-pressure
//! boundary), and a wake-only rate gate. Integration tests build small
//! graphs out of them; they are also a worked example of how real
//! elements publish notifiers.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::element::{Element, EMPTY_NOTIFIER, FULL_NOTIFIER};
use crate::error::NotifyResult;
use crate::notifier::{ActiveNotifier, Notifier, SearchOp};
use crate::router::Router;
use crate::task::Task;

/// A bounded FIFO with packet-available and space-available notifiers.
///
/// Push input, pull output, both passive. The empty notifier is active
/// while the queue holds packets; the full notifier while it has space.
pub struct QueueElement {
    capacity: usize,
    packets: Mutex<VecDeque<u64>>,
    empty_note: Arc<ActiveNotifier>,
    full_note: Arc<ActiveNotifier>,
}

impl QueueElement {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            packets: Mutex::new(VecDeque::new()),
            empty_note: Arc::new(ActiveNotifier::new(SearchOp::Stop)),
            full_note: Arc::new(ActiveNotifier::new(SearchOp::Stop)),
        }
    }

    pub fn len(&self) -> usize {
        self.packets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.lock().is_empty()
    }

    pub fn empty_notifier(&self) -> &Arc<ActiveNotifier> {
        &self.empty_note
    }

    pub fn full_notifier(&self) -> &Arc<ActiveNotifier> {
        &self.full_note
    }

    /// Enqueues a packet, or hands it back when the queue is full.
    pub fn push(&self, packet: u64) -> Result<(), u64> {
        let mut packets = self.packets.lock();
        if packets.len() >= self.capacity {
            return Err(packet);
        }
        packets.push_back(packet);
        let len = packets.len();
        drop(packets);

        self.empty_note.wake();
        if len >= self.capacity {
            self.full_note.sleep();
        }
        Ok(())
    }

    /// Dequeues the oldest packet, if any.
    pub fn pull(&self) -> Option<u64> {
        let mut packets = self.packets.lock();
        let packet = packets.pop_front()?;
        let len = packets.len();
        drop(packets);

        self.full_note.wake();
        if len == 0 {
            self.empty_note.sleep();
        }
        Some(packet)
    }
}

impl Element for QueueElement {
    fn class_name(&self) -> &'static str {
        "Queue"
    }

    fn ninputs(&self) -> usize {
        1
    }

    fn noutputs(&self) -> usize {
        1
    }

    fn notifier(&self, name: &str) -> Option<Arc<dyn Notifier>> {
        match name {
            EMPTY_NOTIFIER => Some(self.empty_note.clone()),
            FULL_NOTIFIER => Some(self.full_note.clone()),
            _ => None,
        }
    }

    fn port_active(&self, _is_output: bool, _port: usize) -> bool {
        false
    }

    fn initialize(&self, router: &Router) -> NotifyResult<()> {
        self.empty_note.initialize(router)?;
        self.full_note.initialize(router)?;
        let len = self.len();
        self.empty_note.set_active(len > 0);
        self.full_note.set_active(len < self.capacity);
        Ok(())
    }
}

/// A pull source: no inputs, one passive output.
pub struct SourceElement;

impl Element for SourceElement {
    fn class_name(&self) -> &'static str {
        "Source"
    }

    fn ninputs(&self) -> usize {
        0
    }

    fn noutputs(&self) -> usize {
        1
    }

    fn port_active(&self, _is_output: bool, _port: usize) -> bool {
        false
    }
}

/// A pull sink: one active input driven by its consumer task.
pub struct SinkElement {
    task: Arc<Task>,
}

impl SinkElement {
    pub fn new() -> Self {
        Self {
            task: Arc::new(Task::new()),
        }
    }

    pub fn task(&self) -> &Arc<Task> {
        &self.task
    }
}

impl Default for SinkElement {
    fn default() -> Self {
        Self::new()
    }
}

impl Element for SinkElement {
    fn class_name(&self) -> &'static str {
        "Sink"
    }

    fn ninputs(&self) -> usize {
        1
    }

    fn noutputs(&self) -> usize {
        0
    }

    fn port_active(&self, is_output: bool, _port: usize) -> bool {
        !is_output
    }
}

/// A transparent N-to-1 pull mux.
pub struct MuxElement {
    inputs: usize,
}

impl MuxElement {
    pub fn new(inputs: usize) -> Self {
        Self { inputs }
    }
}

impl Element for MuxElement {
    fn class_name(&self) -> &'static str {
        "Mux"
    }

    fn ninputs(&self) -> usize {
        self.inputs
    }

    fn noutputs(&self) -> usize {
        1
    }

    fn port_active(&self, _is_output: bool, _port: usize) -> bool {
        false
    }
}

/// A plain push-through element: passive input, active push output.
/// Sitting on a pull path it is the back-pressure boundary searches
/// refuse to cross.
pub struct PushPipe;

impl Element for PushPipe {
    fn class_name(&self) -> &'static str {
        "PushPipe"
    }

    fn ninputs(&self) -> usize {
        1
    }

    fn noutputs(&self) -> usize {
        1
    }

    fn port_active(&self, is_output: bool, _port: usize) -> bool {
        is_output
    }
}

/// A pull-to-push converter: it initiates on both sides.
pub struct UnqueueElement;

impl Element for UnqueueElement {
    fn class_name(&self) -> &'static str {
        "Unqueue"
    }

    fn ninputs(&self) -> usize {
        1
    }

    fn noutputs(&self) -> usize {
        1
    }

    fn port_active(&self, _is_output: bool, _port: usize) -> bool {
        true
    }
}

/// A gate on a pull path whose packet-available notifier only matters
/// when the walk found other back-pressure: think token-bucket rate
/// limiting, where "tokens available" alone is no reason to wake anyone.
pub struct RateGate {
    note: Arc<ActiveNotifier>,
}

impl RateGate {
    pub fn new() -> Self {
        Self {
            note: Arc::new(ActiveNotifier::new(SearchOp::ContinueWake)),
        }
    }

    pub fn notifier(&self) -> &Arc<ActiveNotifier> {
        &self.note
    }

    /// Tokens available: let pulls through.
    pub fn open(&self) {
        self.note.wake();
    }

    /// Tokens spent: pulls would fail.
    pub fn close(&self) {
        self.note.sleep();
    }
}

impl Default for RateGate {
    fn default() -> Self {
        Self::new()
    }
}

impl Element for RateGate {
    fn class_name(&self) -> &'static str {
        "RateGate"
    }

    fn ninputs(&self) -> usize {
        1
    }

    fn noutputs(&self) -> usize {
        1
    }

    fn notifier(&self, name: &str) -> Option<Arc<dyn Notifier>> {
        (name == EMPTY_NOTIFIER).then(|| self.note.clone() as Arc<dyn Notifier>)
    }

    fn port_active(&self, _is_output: bool, _port: usize) -> bool {
        false
    }

    fn initialize(&self, router: &Router) -> NotifyResult<()> {
        self.note.initialize(router)
    }
}
