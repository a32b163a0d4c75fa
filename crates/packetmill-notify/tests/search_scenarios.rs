//! End-to-end searches over small element graphs.

use std::sync::Arc;

use packetmill_notify::test_support::{
    MuxElement, PushPipe, QueueElement, RateGate, SinkElement, SourceElement, UnqueueElement,
};
use packetmill_notify::{
    downstream_full_signal, upstream_empty_signal, Notifier, NotifierSignal, Router,
    RouterBuilder, RouterConfig, BASIC_SIGNALS_PER_WORD,
};

fn initialized(builder: RouterBuilder) -> Router {
    let router = builder.build().expect("graph builds");
    router.initialize_elements().expect("elements initialize");
    router
}

#[test]
fn empty_queue_alone() {
    let mut builder = RouterBuilder::new();
    let source = builder.add_element(Arc::new(SourceElement));
    let queue = Arc::new(QueueElement::new(4));
    let queue_id = builder.add_element(queue.clone());
    let sink = Arc::new(SinkElement::new());
    let sink_id = builder.add_element(sink.clone());
    builder.connect(source, 0, queue_id, 0);
    builder.connect(queue_id, 0, sink_id, 0);
    let router = initialized(builder);

    let task = sink.task().clone();
    let signal = upstream_empty_signal(&router, sink_id, 0, Some(&task), None);

    assert_eq!(signal, queue.empty_notifier().signal());
    assert!(!signal.active());
    assert_eq!(queue.empty_notifier().listeners().len(), 1);

    queue.push(7).expect("queue has room");
    assert!(signal.active());
    assert_eq!(task.reschedule_count(), 1);

    // A second packet is not a second transition.
    queue.push(8).expect("queue has room");
    assert_eq!(task.reschedule_count(), 1);

    queue.pull().expect("packet queued");
    queue.pull().expect("packet queued");
    assert!(!signal.active());
}

#[test]
fn two_empty_queues_merge_precisely() {
    let mut builder = RouterBuilder::new();
    let source_a = builder.add_element(Arc::new(SourceElement));
    let source_b = builder.add_element(Arc::new(SourceElement));
    let queue_a = Arc::new(QueueElement::new(4));
    let queue_b = Arc::new(QueueElement::new(4));
    let queue_a_id = builder.add_element(queue_a.clone());
    let queue_b_id = builder.add_element(queue_b.clone());
    let mux = builder.add_element(Arc::new(MuxElement::new(2)));
    let sink = Arc::new(SinkElement::new());
    let sink_id = builder.add_element(sink.clone());
    builder.connect(source_a, 0, queue_a_id, 0);
    builder.connect(source_b, 0, queue_b_id, 0);
    builder.connect(queue_a_id, 0, mux, 0);
    builder.connect(queue_b_id, 0, mux, 1);
    builder.connect(mux, 0, sink_id, 0);
    let router = initialized(builder);

    let task = sink.task().clone();
    let signal = upstream_empty_signal(&router, sink_id, 0, Some(&task), None);

    let expected = queue_a.empty_notifier().signal() + queue_b.empty_notifier().signal();
    assert_eq!(signal, expected);
    assert!(!signal.is_overderived());
    assert_eq!(
        signal.mask(),
        queue_a.empty_notifier().signal().mask() | queue_b.empty_notifier().signal().mask()
    );

    assert!(!signal.active());
    queue_b.push(1).expect("queue has room");
    assert!(signal.active());
    queue_b.pull().expect("packet queued");
    assert!(!signal.active());
    queue_a.push(2).expect("queue has room");
    assert!(signal.active());

    assert_eq!(queue_a.empty_notifier().listeners().len(), 1);
    assert_eq!(queue_b.empty_notifier().listeners().len(), 1);
}

#[test]
fn push_boundary_degrades_to_busy() {
    let mut builder = RouterBuilder::new();
    let source = builder.add_element(Arc::new(SourceElement));
    let queue = Arc::new(QueueElement::new(4));
    let queue_id = builder.add_element(queue.clone());
    let pipe = builder.add_element(Arc::new(PushPipe));
    let sink = Arc::new(SinkElement::new());
    let sink_id = builder.add_element(sink.clone());
    builder.connect(source, 0, queue_id, 0);
    builder.connect(queue_id, 0, pipe, 0);
    builder.connect(pipe, 0, sink_id, 0);
    let router = initialized(builder);

    let task = sink.task().clone();
    let signal = upstream_empty_signal(&router, sink_id, 0, Some(&task), None);

    assert!(signal.is_busy());
    assert!(signal.active());
    assert!(queue.empty_notifier().listeners().is_empty());
}

#[test]
fn dead_end_without_notifier_degrades_to_busy() {
    let mut builder = RouterBuilder::new();
    let source = builder.add_element(Arc::new(SourceElement));
    let mux = builder.add_element(Arc::new(MuxElement::new(1)));
    let sink = Arc::new(SinkElement::new());
    let sink_id = builder.add_element(sink.clone());
    builder.connect(source, 0, mux, 0);
    builder.connect(mux, 0, sink_id, 0);
    let router = initialized(builder);

    let signal = upstream_empty_signal(&router, sink_id, 0, None, None);
    assert!(signal.is_busy());
}

#[test]
fn unconnected_input_finds_nothing() {
    let mut builder = RouterBuilder::new();
    let sink = Arc::new(SinkElement::new());
    let sink_id = builder.add_element(sink.clone());
    let router = initialized(builder);

    let signal = upstream_empty_signal(&router, sink_id, 0, Some(sink.task()), None);
    assert_eq!(signal, NotifierSignal::uninitialized());
    assert!(!signal.active());
}

#[test]
fn bad_origin_port_finds_nothing() {
    let mut builder = RouterBuilder::new();
    let sink = Arc::new(SinkElement::new());
    let sink_id = builder.add_element(sink.clone());
    let router = initialized(builder);

    let signal = upstream_empty_signal(&router, sink_id, 3, None, None);
    assert_eq!(signal, NotifierSignal::uninitialized());
}

#[test]
fn wake_only_gate_joins_a_real_notifier() {
    let mut builder = RouterBuilder::new();
    let source = builder.add_element(Arc::new(SourceElement));
    let queue = Arc::new(QueueElement::new(4));
    let queue_id = builder.add_element(queue.clone());
    let gate = Arc::new(RateGate::new());
    let gate_id = builder.add_element(gate.clone());
    let sink = Arc::new(SinkElement::new());
    let sink_id = builder.add_element(sink.clone());
    builder.connect(source, 0, queue_id, 0);
    builder.connect(queue_id, 0, gate_id, 0);
    builder.connect(gate_id, 0, sink_id, 0);
    let router = initialized(builder);

    let task = sink.task().clone();
    let signal = upstream_empty_signal(&router, sink_id, 0, Some(&task), None);

    let expected = queue.empty_notifier().signal() + gate.notifier().signal();
    assert_eq!(signal, expected);
    assert!(!signal.is_overderived());

    // Both contributors wake the task.
    assert_eq!(queue.empty_notifier().listeners().len(), 1);
    assert_eq!(gate.notifier().listeners().len(), 1);

    assert!(!signal.active());
    gate.open();
    assert!(signal.active());
    assert_eq!(task.reschedule_count(), 1);
    gate.close();
    queue.push(1).expect("queue has room");
    assert!(signal.active());
    assert_eq!(task.reschedule_count(), 2);
}

#[test]
fn wake_only_gate_alone_is_busy() {
    let mut builder = RouterBuilder::new();
    let source = builder.add_element(Arc::new(SourceElement));
    let gate = Arc::new(RateGate::new());
    let gate_id = builder.add_element(gate.clone());
    let sink = Arc::new(SinkElement::new());
    let sink_id = builder.add_element(sink.clone());
    builder.connect(source, 0, gate_id, 0);
    builder.connect(gate_id, 0, sink_id, 0);
    let router = initialized(builder);

    let signal = upstream_empty_signal(&router, sink_id, 0, None, None);
    assert!(signal.is_busy());
}

#[test]
fn downstream_full_signal_tracks_space() {
    let mut builder = RouterBuilder::new();
    let source = builder.add_element(Arc::new(SourceElement));
    let queue = Arc::new(QueueElement::new(2));
    let queue_id = builder.add_element(queue.clone());
    let sink = Arc::new(SinkElement::new());
    let sink_id = builder.add_element(sink.clone());
    builder.connect(source, 0, queue_id, 0);
    builder.connect(queue_id, 0, sink_id, 0);
    let router = initialized(builder);

    let task = Arc::new(packetmill_notify::Task::new());
    let signal = downstream_full_signal(&router, source, 0, Some(&task), None);

    assert_eq!(signal, queue.full_notifier().signal());
    assert!(signal.active());

    queue.push(1).expect("queue has room");
    queue.push(2).expect("queue has room");
    assert!(!signal.active());

    let before = task.reschedule_count();
    queue.pull().expect("packet queued");
    assert!(signal.active());
    assert_eq!(task.reschedule_count(), before + 1);
}

#[test]
fn exhausted_signal_budget_degrades_search_to_busy() {
    let config = RouterConfig {
        grow_signal_words: false,
        ..RouterConfig::default()
    };
    let mut builder = RouterBuilder::with_config(config);
    let source = builder.add_element(Arc::new(SourceElement));
    let queue = Arc::new(QueueElement::new(4));
    let queue_id = builder.add_element(queue.clone());
    let sink = Arc::new(SinkElement::new());
    let sink_id = builder.add_element(sink.clone());
    builder.connect(source, 0, queue_id, 0);
    builder.connect(queue_id, 0, sink_id, 0);
    let router = builder.build().expect("graph builds");

    // Burn the whole budget before the queue gets its signal.
    for _ in 0..BASIC_SIGNALS_PER_WORD {
        router.new_basic_signal().expect("budget not yet spent");
    }

    let signal = upstream_empty_signal(&router, sink_id, 0, Some(sink.task()), None);
    assert!(signal.is_busy());
    assert!(queue.empty_notifier().listeners().is_empty());
}

#[test]
fn downstream_pull_boundary_degrades_to_busy() {
    let mut builder = RouterBuilder::new();
    let source = builder.add_element(Arc::new(SourceElement));
    let unqueue = builder.add_element(Arc::new(UnqueueElement));
    let queue = Arc::new(QueueElement::new(2));
    let queue_id = builder.add_element(queue.clone());
    let sink = Arc::new(SinkElement::new());
    let sink_id = builder.add_element(sink.clone());
    builder.connect(source, 0, unqueue, 0);
    builder.connect(unqueue, 0, queue_id, 0);
    builder.connect(queue_id, 0, sink_id, 0);
    let router = initialized(builder);

    let signal = downstream_full_signal(&router, source, 0, None, None);
    assert!(signal.is_busy());
    assert!(queue.full_notifier().listeners().is_empty());
}
