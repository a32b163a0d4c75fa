//! Activity signals and sleep/wakeup notification for a modular
//! packet-processing router.
//!
//! Elements in the router graph move packets by push or pull. When a pull
//! consumer faces an empty queue (or a push producer a full one) it
//! must neither spin nor block the dataflow. Instead it checks an
//! *activity signal* ("is it worth trying?"), goes to sleep when the
//! answer is no, and is rescheduled by the producer's notifier when the
//! answer changes.
//!
//! The pieces, bottom up:
//!
//! - [`SignalWord`] / [`NotifierSignal`]: an atomic bitmap cell plus a
//!   word-and-mask value type closed under `+`, with idle, busy, and
//!   overderived singletons.
//! - [`Notifier`] / [`ActiveNotifier`]: a named signal published by an
//!   element; the active flavor wakes listener tasks and cascades to
//!   dependent notifiers on the inactive-to-active transition.
//! - [`upstream_empty_signal`] / [`downstream_full_signal`]: graph walks
//!   that combine every reachable notifier of a kind into one derived
//!   signal and register the consumer for wakeup along the way.
//!
//! Listener bookkeeping runs on the router's single dataflow worker;
//! only the signal bits themselves are shared across threads.

pub mod config;
pub mod element;
pub mod error;
pub mod notifier;
pub mod router;
pub mod search;
pub mod signal;
pub mod task;
pub mod test_support;

pub use config::RouterConfig;
pub use element::{Element, ElementId, PortSet, EMPTY_NOTIFIER, FULL_NOTIFIER};
pub use error::{NotifyError, NotifyResult};
pub use notifier::{ActiveNotifier, Notifier, PassiveNotifier, SearchOp};
pub use router::{Connection, ElementFilter, Router, RouterBuilder};
pub use search::{downstream_full_signal, upstream_empty_signal};
pub use signal::{NotifierSignal, SignalWord, BASIC_SIGNALS_PER_WORD};
pub use task::{Task, TaskState};
