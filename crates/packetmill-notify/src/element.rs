//! The element surface the notifier core consumes.
//!
//! Elements are nodes in the router's processing graph. The core needs
//! very little from them: how many ports they have, which ports initiate
//! transfers (the push/pull discipline), how packets flow across them, and
//! which notifiers they publish under well-known capability names.

use std::fmt;
use std::sync::Arc;

use crate::error::NotifyResult;
use crate::notifier::Notifier;
use crate::router::Router;

/// Capability name under which queue-like elements publish their
/// packet-available signal.
pub const EMPTY_NOTIFIER: &str = "Notifier.EMPTY";

/// Capability name under which queue-like elements publish their
/// space-available signal.
pub const FULL_NOTIFIER: &str = "Notifier.FULL";

/// Index of an element within its router.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId(u32);

impl ElementId {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// A set of port indices, stored as a bitmap.
///
/// Used by [`Element::port_flow`] to describe which opposite-side ports a
/// packet entering (or leaving) a given port can reach.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PortSet {
    bits: Vec<u64>,
}

impl PortSet {
    /// An empty set.
    pub fn none() -> Self {
        Self::default()
    }

    /// The full set over `nports` ports.
    pub fn all(nports: usize) -> Self {
        let mut set = Self::default();
        for port in 0..nports {
            set.insert(port);
        }
        set
    }

    pub fn insert(&mut self, port: usize) {
        let word = port / 64;
        if word >= self.bits.len() {
            self.bits.resize(word + 1, 0);
        }
        self.bits[word] |= 1 << (port % 64);
    }

    pub fn contains(&self, port: usize) -> bool {
        self.bits
            .get(port / 64)
            .is_some_and(|word| word & (1 << (port % 64)) != 0)
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|word| *word == 0)
    }

    /// Iterates the set ports in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.iter().enumerate().flat_map(|(index, word)| {
            let mut rest = *word;
            std::iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let bit = rest.trailing_zeros() as usize;
                rest &= rest - 1;
                Some(index * 64 + bit)
            })
        })
    }
}

impl FromIterator<usize> for PortSet {
    fn from_iter<I: IntoIterator<Item = usize>>(ports: I) -> Self {
        let mut set = Self::default();
        for port in ports {
            set.insert(port);
        }
        set
    }
}

/// A node in the router graph, seen through the notifier core's eyes.
///
/// `is_output` selects the port side throughout: true names an output
/// port, false an input port.
pub trait Element: Send + Sync {
    fn class_name(&self) -> &'static str;

    fn ninputs(&self) -> usize;

    fn noutputs(&self) -> usize;

    /// Returns the notifier published under `name`, if any. The stable
    /// names are [`EMPTY_NOTIFIER`] and [`FULL_NOTIFIER`]; elements may
    /// publish others.
    fn notifier(&self, name: &str) -> Option<Arc<dyn Notifier>> {
        let _ = name;
        None
    }

    /// Called once the graph is assembled, before the dataflow starts.
    /// Elements obtain basic signals for their notifiers here and set
    /// the initial activity. The default does nothing; searches also
    /// initialize any notifier they find uninitialized.
    fn initialize(&self, router: &Router) -> NotifyResult<()> {
        let _ = router;
        Ok(())
    }

    /// True when this element initiates transfers on the port: a push
    /// output or a pull input. A true answer on the far side of a graph
    /// walk marks a back-pressure boundary.
    fn port_active(&self, is_output: bool, port: usize) -> bool;

    /// Which opposite-side ports are reachable from this port. The
    /// default says "all of them", which is right for pipes, muxes, and
    /// most packet-processing elements.
    fn port_flow(&self, is_output: bool, port: usize) -> PortSet {
        let _ = port;
        PortSet::all(if is_output {
            self.ninputs()
        } else {
            self.noutputs()
        })
    }
}
