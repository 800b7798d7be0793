//! Lookup of published pins by name.

use std::{collections::BTreeMap, sync::Arc};

use parking_lot::RwLock;

use crate::{
    errors::{Error, Result},
    gpio::PinIO,
};

/// A pin as handed out by a [`PinRegistry`].
pub type SharedPin = Arc<dyn PinIO>;

/// Rows of pins making up a header, in physical order.
pub type Header = Vec<Vec<SharedPin>>;

/// Pins by name and headers by name.
///
/// Owned by whoever wires up the application, nothing in this crate keeps a
/// process-wide registry.
#[derive(Default)]
pub struct PinRegistry {
    pins: RwLock<BTreeMap<String, SharedPin>>,
    headers: RwLock<BTreeMap<String, Header>>,
}

impl PinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `pin` under its name. Names are unique.
    pub fn register(&self, pin: SharedPin) -> Result<()> {
        let name = pin.name();
        let mut pins = self.pins.write();
        if pins.contains_key(&name) {
            return Err(Error::AlreadyRegistered { kind: "pin", name });
        }
        pins.insert(name, pin);
        Ok(())
    }

    /// Publish a group of pins, e.g. every line of a chip.
    pub fn register_header(&self, name: &str, rows: Header) -> Result<()> {
        let mut headers = self.headers.write();
        if headers.contains_key(name) {
            return Err(Error::AlreadyRegistered {
                kind: "header",
                name: name.to_owned(),
            });
        }
        headers.insert(name.to_owned(), rows);
        Ok(())
    }

    pub fn by_name(&self, name: &str) -> Option<SharedPin> {
        self.pins.read().get(name).cloned()
    }

    /// Every registered pin, ordered by name.
    pub fn pins(&self) -> Vec<SharedPin> {
        self.pins.read().values().cloned().collect()
    }

    pub fn header(&self, name: &str) -> Option<Header> {
        self.headers.read().get(name).cloned()
    }

    /// Names of every registered header, sorted.
    pub fn header_names(&self) -> Vec<String> {
        self.headers.read().keys().cloned().collect()
    }
}

impl std::fmt::Debug for PinRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinRegistry")
            .field("pins", &self.pins.read().keys().collect::<Vec<_>>())
            .field("headers", &self.headers.read().keys().collect::<Vec<_>>())
            .finish()
    }
}
