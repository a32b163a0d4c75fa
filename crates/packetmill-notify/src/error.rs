use crate::element::ElementId;

/// A specialized error type for notification and graph-walk operations.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The router cannot hand out another basic signal.
    #[error("basic signal budget exhausted after {0} allocations")]
    SignalExhausted(u32),
    /// A listener-list reallocation failed.
    #[error("out of memory growing notifier listener list")]
    OutOfMemory,
    /// The element id does not belong to this router.
    #[error("unknown element: {0}")]
    UnknownElement(ElementId),
    /// A connection or search origin names a port the element does not have.
    #[error("element {element} has no such port: {port}")]
    NoSuchPort { element: ElementId, port: usize },
}

impl NotifyError {
    /// Create a port error for the given element and port index.
    pub fn no_such_port(element: ElementId, port: usize) -> Self {
        Self::NoSuchPort { element, port }
    }
}

/// A Result type alias for notification operations.
pub type NotifyResult<T> = Result<T, NotifyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_such_port_helper() {
        let err = NotifyError::no_such_port(ElementId::new(3), 7);
        assert!(matches!(
            err,
            NotifyError::NoSuchPort { element, port: 7 } if element == ElementId::new(3)
        ));
    }
}
