//! Registry of known containers.
//!
//! The map is guarded by a reader/writer lock. Critical sections are single
//! map operations; no I/O ever happens with the lock held.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use conman_common::error::{ConmanError, Result};
use conman_common::types::ContainerId;

use crate::handle::Handle;

/// Lookup half of the registry.
pub trait ReadOnlyStore: Send + Sync {
    /// Returns the handle registered under `id`.
    ///
    /// The returned `Arc` points at the very handle that was inserted.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no handle is registered under `id`.
    fn get(&self, id: &ContainerId) -> Result<Arc<Handle>>;
}

/// Full registry interface.
pub trait Store: ReadOnlyStore {
    /// Inserts `handle`, replacing any handle with the same identifier.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the handle's identifier is empty.
    fn put(&self, handle: Arc<Handle>) -> Result<()>;

    /// Removes and returns the handle registered under `id`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no handle is registered under `id`.
    fn remove(&self, id: &ContainerId) -> Result<Arc<Handle>>;

    /// Returns a cursor over the handles registered at call time.
    fn iter(&self) -> StoreIter;

    /// Number of registered handles.
    fn len(&self) -> usize;

    /// Returns `true` if nothing is registered.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Finite, restartable cursor over a registry snapshot.
///
/// Every handle present when the snapshot was taken is yielded exactly
/// once, in identifier order. Later insertions are not observed.
#[derive(Debug, Clone)]
pub struct StoreIter {
    handles: Vec<Arc<Handle>>,
    pos: usize,
}

impl StoreIter {
    fn new(mut handles: Vec<Arc<Handle>>) -> Self {
        handles.sort_by(|a, b| a.id().cmp(b.id()));
        Self { handles, pos: 0 }
    }

    /// Returns `true` if another handle remains.
    pub fn has_next(&self) -> bool {
        self.pos < self.handles.len()
    }

    /// Rewinds the cursor to the first handle of the same snapshot.
    pub fn restart(&mut self) {
        self.pos = 0;
    }
}

impl Iterator for StoreIter {
    type Item = Arc<Handle>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.handles.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.handles.len() - self.pos;
        (left, Some(left))
    }
}

impl ExactSizeIterator for StoreIter {}

/// In-memory registry.
#[derive(Debug, Default)]
pub struct InMemStore {
    handles: RwLock<HashMap<ContainerId, Arc<Handle>>>,
}

impl InMemStore {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReadOnlyStore for InMemStore {
    fn get(&self, id: &ContainerId) -> Result<Arc<Handle>> {
        let handles = self.handles.read().unwrap_or_else(PoisonError::into_inner);
        handles.get(id).cloned().ok_or_else(|| ConmanError::NotFound {
            kind: "container",
            id: id.to_string(),
        })
    }
}

impl Store for InMemStore {
    fn put(&self, handle: Arc<Handle>) -> Result<()> {
        if handle.id().is_empty() {
            return Err(ConmanError::InvalidArgument {
                message: "cannot put handle because id is not defined".into(),
            });
        }
        let id = handle.id().clone();
        let replaced = self
            .handles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), handle);
        tracing::debug!(id = %id, replaced = replaced.is_some(), "handle registered");
        Ok(())
    }

    fn remove(&self, id: &ContainerId) -> Result<Arc<Handle>> {
        self.handles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .ok_or_else(|| ConmanError::NotFound {
                kind: "container",
                id: id.to_string(),
            })
    }

    fn iter(&self) -> StoreIter {
        let snapshot: Vec<_> = self
            .handles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        StoreIter::new(snapshot)
    }

    fn len(&self) -> usize {
        self.handles.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use conman_common::error::ErrorKind;

    use super::*;
    use crate::handle::tests::TempLayout;

    fn handle(id: &str) -> Arc<Handle> {
        Arc::new(Handle::open(
            ContainerId::new(id),
            &TempLayout(PathBuf::from("/tmp/conman-store-test")),
        ))
    }

    #[test]
    fn get_unknown_is_not_found() {
        let store = InMemStore::new();
        let err = store.get(&ContainerId::new("missing")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn put_empty_id_is_invalid_argument() {
        let store = InMemStore::new();
        let err = store.put(handle("")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(store.is_empty());
    }

    #[test]
    fn get_returns_the_inserted_handle() {
        let store = InMemStore::new();
        let h = handle("a");
        store.put(Arc::clone(&h)).expect("put");
        let got = store.get(&ContainerId::new("a")).expect("get");
        assert!(Arc::ptr_eq(&h, &got));
    }

    #[test]
    fn put_overwrites_same_id() {
        let store = InMemStore::new();
        store.put(handle("a")).expect("put");
        let second = handle("a");
        store.put(Arc::clone(&second)).expect("put again");
        assert_eq!(store.len(), 1);
        assert!(Arc::ptr_eq(&second, &store.get(&ContainerId::new("a")).expect("get")));
    }

    #[test]
    fn iter_yields_every_handle_exactly_once() {
        let store = InMemStore::new();
        for id in ["c", "a", "b"] {
            store.put(handle(id)).expect("put");
        }
        let ids: Vec<_> = store.iter().map(|h| h.id().to_string()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn iter_over_single_handle_includes_it() {
        let store = InMemStore::new();
        store.put(handle("only")).expect("put");
        let mut it = store.iter();
        assert!(it.has_next());
        assert_eq!(it.next().expect("first").id().as_str(), "only");
        assert!(!it.has_next());
        assert!(it.next().is_none());
    }

    #[test]
    fn iter_is_a_snapshot_and_restartable() {
        let store = InMemStore::new();
        store.put(handle("a")).expect("put");
        let mut it = store.iter();
        store.put(handle("b")).expect("put later");

        assert_eq!(it.len(), 1);
        assert_eq!(it.by_ref().count(), 1);
        it.restart();
        assert_eq!(it.count(), 1);
        assert_eq!(store.iter().count(), 2);
    }

    #[test]
    fn remove_returns_handle_and_forgets_it() {
        let store = InMemStore::new();
        store.put(handle("a")).expect("put");
        let removed = store.remove(&ContainerId::new("a")).expect("remove");
        assert_eq!(removed.id().as_str(), "a");
        assert_eq!(
            store.remove(&ContainerId::new("a")).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn concurrent_readers_and_writers() {
        let store = InMemStore::new();
        std::thread::scope(|s| {
            for w in 0..4 {
                let store = &store;
                let _ = s.spawn(move || {
                    for i in 0..100 {
                        store.put(handle(&format!("{w}-{i}"))).expect("put");
                    }
                });
            }
            for _ in 0..4 {
                let store = &store;
                let _ = s.spawn(move || {
                    for _ in 0..100 {
                        assert!(store.iter().all(|h| !h.id().is_empty()));
                    }
                });
            }
        });
        assert_eq!(store.len(), 400);
    }
}
