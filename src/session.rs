use crate::registry::Registry;
use crate::store::ObjectStore;

/// Everything a command runs against.
///
/// Fields are public so commands can borrow the store mutably while reading
/// the registry.
#[derive(Debug)]
pub struct Session {
    /// Live entities and their backing file.
    pub store: ObjectStore,
    /// Known type tags.
    pub registry: Registry,
    /// Set by `quit`; the read loop stops once it is true.
    pub should_exit: bool,
}

impl Session {
    pub fn new(store: ObjectStore, registry: Registry) -> Self {
        Self {
            store,
            registry,
            should_exit: false,
        }
    }
}
