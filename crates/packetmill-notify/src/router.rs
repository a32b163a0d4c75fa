//! The router: element graph, basic-signal allocation, and the port
//! walks the notifier searches are built on.
//!
//! Only the surface the notification core needs is carried here. Graph
//! construction goes through [`RouterBuilder`], which validates every
//! connection against the elements' port counts so the walks can trust
//! the adjacency they traverse.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::config::RouterConfig;
use crate::element::{Element, ElementId};
use crate::error::{NotifyError, NotifyResult};
use crate::signal::{BASIC_SIGNALS_PER_WORD, FIRST_BASIC_BIT, NotifierSignal, SignalWord};

/// A directed hookup from an output port to an input port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Connection {
    pub from_element: ElementId,
    pub from_port: usize,
    pub to_element: ElementId,
    pub to_port: usize,
}

/// Stateful visitor invoked by the port walks at every reached element.
///
/// Returning true ends the walk along that branch; returning false lets
/// it continue through the element along its port flow.
pub trait ElementFilter {
    fn check_match(&mut self, element: &dyn Element, is_output: bool, port: usize) -> bool;
}

struct SignalAllocator {
    words: Vec<Arc<SignalWord>>,
    allocated: u32,
}

/// Assembles the element graph for a [`Router`].
pub struct RouterBuilder {
    elements: Vec<Arc<dyn Element>>,
    connections: Vec<Connection>,
    config: RouterConfig,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::with_config(RouterConfig::default())
    }

    pub fn with_config(config: RouterConfig) -> Self {
        Self {
            elements: Vec::new(),
            connections: Vec::new(),
            config: config.normalized(),
        }
    }

    /// Registers an element and returns its id.
    pub fn add_element(&mut self, element: Arc<dyn Element>) -> ElementId {
        let id = ElementId::new(self.elements.len() as u32);
        self.elements.push(element);
        id
    }

    /// Hooks `from`'s output port up to `to`'s input port. Ports are
    /// validated in [`RouterBuilder::build`].
    pub fn connect(
        &mut self,
        from: ElementId,
        from_port: usize,
        to: ElementId,
        to_port: usize,
    ) -> &mut Self {
        self.connections.push(Connection {
            from_element: from,
            from_port,
            to_element: to,
            to_port,
        });
        self
    }

    pub fn build(self) -> NotifyResult<Router> {
        let mut forward: HashMap<(ElementId, usize), Vec<(ElementId, usize)>> = HashMap::new();
        let mut backward: HashMap<(ElementId, usize), Vec<(ElementId, usize)>> = HashMap::new();

        for connection in &self.connections {
            let from = self
                .elements
                .get(connection.from_element.index())
                .ok_or(NotifyError::UnknownElement(connection.from_element))?;
            let to = self
                .elements
                .get(connection.to_element.index())
                .ok_or(NotifyError::UnknownElement(connection.to_element))?;
            if connection.from_port >= from.noutputs() {
                return Err(NotifyError::no_such_port(
                    connection.from_element,
                    connection.from_port,
                ));
            }
            if connection.to_port >= to.ninputs() {
                return Err(NotifyError::no_such_port(
                    connection.to_element,
                    connection.to_port,
                ));
            }
            forward
                .entry((connection.from_element, connection.from_port))
                .or_default()
                .push((connection.to_element, connection.to_port));
            backward
                .entry((connection.to_element, connection.to_port))
                .or_default()
                .push((connection.from_element, connection.from_port));
        }

        let words = (0..self.config.initial_signal_words)
            .map(|_| Arc::new(SignalWord::new(0)))
            .collect();

        Ok(Router {
            elements: self.elements,
            connections: self.connections,
            forward,
            backward,
            config: self.config,
            signals: Mutex::new(SignalAllocator {
                words,
                allocated: 0,
            }),
        })
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A configured element graph plus its shared signal storage.
pub struct Router {
    elements: Vec<Arc<dyn Element>>,
    connections: Vec<Connection>,
    forward: HashMap<(ElementId, usize), Vec<(ElementId, usize)>>,
    backward: HashMap<(ElementId, usize), Vec<(ElementId, usize)>>,
    config: RouterConfig,
    signals: Mutex<SignalAllocator>,
}

impl Router {
    pub fn nelements(&self) -> usize {
        self.elements.len()
    }

    pub fn element(&self, id: ElementId) -> Option<&Arc<dyn Element>> {
        self.elements.get(id.index())
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Runs every element's initialize hook, in registration order.
    pub fn initialize_elements(&self) -> NotifyResult<()> {
        for element in &self.elements {
            element.initialize(self)?;
        }
        Ok(())
    }

    /// Hands out the next basic signal: a single fresh bit in the
    /// router's signal storage.
    ///
    /// All signals share one word until it fills. What happens then is
    /// governed by [`RouterConfig`]: by default a new word is allocated,
    /// which keeps producers going but makes combined signals spanning
    /// both words collapse to overderived; with growth disabled the call
    /// fails and the caller is expected to fall back to busy.
    pub fn new_basic_signal(&self) -> NotifyResult<NotifierSignal> {
        let mut allocator = self.signals.lock();
        let word_index = (allocator.allocated / BASIC_SIGNALS_PER_WORD) as usize;
        let bit = FIRST_BASIC_BIT + allocator.allocated % BASIC_SIGNALS_PER_WORD;

        if word_index >= allocator.words.len() {
            if !self.config.grow_signal_words {
                warn!(
                    allocated = allocator.allocated,
                    "basic signal budget exhausted"
                );
                return Err(NotifyError::SignalExhausted(allocator.allocated));
            }
            allocator.words.push(Arc::new(SignalWord::new(0)));
        }

        let word = allocator.words[word_index].clone();
        allocator.allocated += 1;
        Ok(NotifierSignal::basic(word, bit))
    }

    /// Walks the graph upstream from `origin`'s input port, visiting the
    /// output ports that feed it, transitively, until the filter stops a
    /// branch. Returns the distinct elements reached.
    pub fn upstream_elements(
        &self,
        origin: ElementId,
        port: usize,
        filter: &mut dyn ElementFilter,
    ) -> NotifyResult<Vec<ElementId>> {
        self.walk(origin, port, false, filter)
    }

    /// The downstream mirror of [`Router::upstream_elements`], following
    /// output ports to the input ports they feed.
    pub fn downstream_elements(
        &self,
        origin: ElementId,
        port: usize,
        filter: &mut dyn ElementFilter,
    ) -> NotifyResult<Vec<ElementId>> {
        self.walk(origin, port, true, filter)
    }

    fn walk(
        &self,
        origin: ElementId,
        port: usize,
        downstream: bool,
        filter: &mut dyn ElementFilter,
    ) -> NotifyResult<Vec<ElementId>> {
        let origin_element = self
            .element(origin)
            .ok_or(NotifyError::UnknownElement(origin))?;
        let origin_ports = if downstream {
            origin_element.noutputs()
        } else {
            origin_element.ninputs()
        };
        if port >= origin_ports {
            return Err(NotifyError::no_such_port(origin, port));
        }

        // Arrival side: an upstream walk lands on output ports, a
        // downstream walk on input ports.
        let is_output = !downstream;
        let links = if downstream {
            &self.forward
        } else {
            &self.backward
        };

        let mut stack: Vec<(ElementId, usize)> = Vec::new();
        let mut visited_ports: HashSet<(ElementId, usize)> = HashSet::new();
        let mut reached: Vec<ElementId> = Vec::new();
        let mut reached_set: HashSet<ElementId> = HashSet::new();

        if let Some(neighbors) = links.get(&(origin, port)) {
            stack.extend(neighbors.iter().copied());
        }

        while let Some((id, arrival_port)) = stack.pop() {
            if !visited_ports.insert((id, arrival_port)) {
                continue;
            }
            let element = self.element(id).ok_or(NotifyError::UnknownElement(id))?;
            if reached_set.insert(id) {
                reached.push(id);
            }
            if filter.check_match(element.as_ref(), is_output, arrival_port) {
                continue;
            }
            for far_port in element.port_flow(is_output, arrival_port).iter() {
                if let Some(neighbors) = links.get(&(id, far_port)) {
                    stack.extend(neighbors.iter().copied());
                }
            }
        }

        Ok(reached)
    }
}
