//! In-memory object-capability store.
//!
//! One [`CapabilityRegistry`] is shared per chain. Each module gets a
//! [`ScopedCapabilityKeeper`] that sees only the names it owns.

use crate::domain::{Capability, IcaError};
use crate::ports::CapabilityKeeper;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// Chain-wide capability bookkeeping.
#[derive(Default)]
pub struct CapabilityRegistry {
    next_index: Mutex<u64>,
    /// (module, name) -> capability
    owners: RwLock<HashMap<(String, String), Capability>>,
}

impl CapabilityRegistry {
    /// Create an empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Keeper scoped to `module`.
    pub fn scope(self: &Arc<Self>, module: impl Into<String>) -> ScopedCapabilityKeeper {
        ScopedCapabilityKeeper {
            registry: Arc::clone(self),
            module: module.into(),
        }
    }

    fn is_minted(&self, capability: &Capability) -> bool {
        capability.index < *self.next_index.lock()
    }
}

/// Capability keeper restricted to one module.
#[derive(Clone)]
pub struct ScopedCapabilityKeeper {
    registry: Arc<CapabilityRegistry>,
    module: String,
}

impl ScopedCapabilityKeeper {
    /// Owning module name.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Give up ownership of `name` in every module that holds the same capability.
    pub fn release_capability(&self, name: &str) {
        let mut owners = self.registry.owners.write();
        if let Some(capability) = owners.remove(&(self.module.clone(), name.to_string())) {
            owners.retain(|_, held| *held != capability);
        }
    }
}

impl CapabilityKeeper for ScopedCapabilityKeeper {
    fn new_capability(&self, name: &str) -> Result<Capability, IcaError> {
        let key = (self.module.clone(), name.to_string());
        let mut owners = self.registry.owners.write();
        if owners.contains_key(&key) {
            return Err(IcaError::Capability(format!(
                "capability name {} already taken by {}",
                name, self.module
            )));
        }

        let mut next = self.registry.next_index.lock();
        let capability = Capability { index: *next };
        *next += 1;
        owners.insert(key, capability);
        Ok(capability)
    }

    fn claim_capability(&self, capability: &Capability, name: &str) -> Result<(), IcaError> {
        if !self.registry.is_minted(capability) {
            return Err(IcaError::Capability(format!(
                "capability {} was never issued",
                capability.index
            )));
        }

        let key = (self.module.clone(), name.to_string());
        let mut owners = self.registry.owners.write();
        if owners.contains_key(&key) {
            return Err(IcaError::Capability(format!(
                "module {} already owns capability {}",
                self.module, name
            )));
        }
        owners.insert(key, *capability);
        Ok(())
    }

    fn get_capability(&self, name: &str) -> Option<Capability> {
        self.registry
            .owners
            .read()
            .get(&(self.module.clone(), name.to_string()))
            .copied()
    }

    fn authenticate_capability(&self, capability: &Capability, name: &str) -> bool {
        self.get_capability(name) == Some(*capability)
    }
}
