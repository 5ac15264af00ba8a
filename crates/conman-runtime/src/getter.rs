//! Live container lookups.

use std::sync::Arc;

use conman_common::error::{Result, ResultExt};
use conman_common::types::ContainerId;

use crate::handle::Handle;
use crate::instance::Instance;
use crate::oci::OciRuntime;
use crate::store::Store;

/// Resolves identifiers to a live runtime view of the container.
pub trait ContainerGetter: Send + Sync {
    /// Returns the live instance and the registered handle for `id`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `id` is not registered, or the runtime's error
    /// if the live query fails.
    fn get(&self, id: &ContainerId) -> Result<(Instance, Arc<Handle>)>;

    /// Returns the live instance of every registered container, in
    /// identifier order.
    ///
    /// # Errors
    ///
    /// Fails as a whole on the first failing query.
    fn list(&self) -> Result<Vec<(Instance, Arc<Handle>)>>;
}

/// Getter combining a registry lookup with an OCI runtime `state` query.
pub struct RuntimeGetter {
    store: Arc<dyn Store>,
    runtime: Arc<dyn OciRuntime>,
}

impl RuntimeGetter {
    /// Creates a getter over `store` that queries `runtime`.
    pub fn new(store: Arc<dyn Store>, runtime: Arc<dyn OciRuntime>) -> Self {
        Self { store, runtime }
    }

    fn query(&self, handle: Arc<Handle>) -> Result<(Instance, Arc<Handle>)> {
        let instance = self
            .runtime
            .container(&handle)
            .context(format!("cannot query container {}", handle.id()))?;
        Ok((instance, handle))
    }
}

impl ContainerGetter for RuntimeGetter {
    fn get(&self, id: &ContainerId) -> Result<(Instance, Arc<Handle>)> {
        let handle = self.store.get(id)?;
        self.query(handle)
    }

    fn list(&self) -> Result<Vec<(Instance, Arc<Handle>)>> {
        self.store.iter().map(|handle| self.query(handle)).collect()
    }
}
