//! Rollback of partially completed container creations.
//!
//! Creation touches the filesystem, the OCI runtime, and the registry. A
//! [`CreateSaga`] records one compensation per step that may have left
//! something behind; dropping the saga without calling
//! [`CreateSaga::commit`] undoes those steps in reverse order.

use std::path::PathBuf;
use std::sync::Arc;

use conman_common::types::ContainerId;

use crate::handle::Handle;
use crate::oci::OciRuntime;
use crate::store::Store;

/// Undo action for one completed creation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compensation {
    /// Remove the container's base directory.
    RemoveLayout(PathBuf),
    /// Force-delete the container from the OCI runtime. Recorded before
    /// the launch, so a runtime that never heard of the container makes
    /// this step fail harmlessly.
    DeleteContainer,
    /// Remove the handle from the registry.
    Deregister,
}

/// Guard that rolls back a creation unless committed.
pub struct CreateSaga {
    handle: Arc<Handle>,
    runtime: Arc<dyn OciRuntime>,
    store: Arc<dyn Store>,
    done: Vec<Compensation>,
}

impl CreateSaga {
    /// Starts tracking the creation of `handle`, whose layout was just
    /// allocated.
    pub fn begin(handle: Arc<Handle>, runtime: Arc<dyn OciRuntime>, store: Arc<dyn Store>) -> Self {
        let done = vec![Compensation::RemoveLayout(handle.base_dir().to_path_buf())];
        Self {
            handle,
            runtime,
            store,
            done,
        }
    }

    /// Records how to undo a step that completed or may have partly
    /// completed.
    pub fn completed(&mut self, step: Compensation) {
        self.done.push(step);
    }

    /// Compensations recorded so far, oldest first.
    pub fn pending(&self) -> &[Compensation] {
        &self.done
    }

    /// Finishes the saga; nothing will be rolled back.
    pub fn commit(mut self) -> ContainerId {
        self.done.clear();
        self.handle.id().clone()
    }

    fn compensate(&self, step: &Compensation) {
        let id = self.handle.id();
        let outcome = match step {
            Compensation::RemoveLayout(dir) => std::fs::remove_dir_all(dir)
                .map_err(|e| conman_common::error::ConmanError::io(dir, e)),
            Compensation::DeleteContainer => self.runtime.delete_container(&self.handle),
            Compensation::Deregister => self.store.remove(id).map(|_| ()),
        };
        match outcome {
            Ok(()) => tracing::debug!(id = %id, ?step, "creation step rolled back"),
            Err(e) => tracing::warn!(id = %id, ?step, error = %e, "rollback step failed"),
        }
    }
}

impl Drop for CreateSaga {
    fn drop(&mut self) {
        if self.done.is_empty() {
            return;
        }
        tracing::info!(id = %self.handle.id(), steps = self.done.len(), "rolling back container creation");
        for step in self.done.iter().rev() {
            self.compensate(step);
        }
    }
}
