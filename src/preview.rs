//! Scoped local preview handles.
//!
//! A [`PreviewHandle`] is the crate's equivalent of a browser object URL: a
//! locally dereferenceable reference to image bytes, allocated from a
//! [`PreviewStore`] and released when the handle is dropped. Pending crops,
//! new gallery images and their replacements each own one; removing an image
//! or ending the session frees it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

const URL_PREFIX: &str = "blob:unit-media/";

#[derive(Default)]
struct StoreInner {
    next_id: u64,
    entries: HashMap<u64, Arc<[u8]>>,
}

/// Registry of live preview handles for one edit session.
#[derive(Clone, Default)]
pub struct PreviewStore {
    inner: Rc<RefCell<StoreInner>>,
}

impl PreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bytes` and return a handle that keeps them reachable.
    pub fn allocate(&self, bytes: Arc<[u8]>) -> PreviewHandle {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.entries.insert(id, bytes);
        PreviewHandle {
            id,
            store: Rc::downgrade(&self.inner),
        }
    }

    /// Dereference a preview URL. `None` once the handle has been released.
    pub fn get(&self, url: &str) -> Option<Arc<[u8]>> {
        let id: u64 = url.strip_prefix(URL_PREFIX)?.parse().ok()?;
        self.inner.borrow().entries.get(&id).cloned()
    }

    /// Number of handles not yet released.
    pub fn live_count(&self) -> usize {
        self.inner.borrow().entries.len()
    }
}

impl fmt::Debug for PreviewStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewStore")
            .field("live", &self.live_count())
            .finish()
    }
}

/// Owned preview reference; dropping it releases the bytes from the store.
pub struct PreviewHandle {
    id: u64,
    store: Weak<RefCell<StoreInner>>,
}

impl PreviewHandle {
    pub fn url(&self) -> String {
        format!("{URL_PREFIX}{}", self.id)
    }
}

impl fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PreviewHandle").field(&self.url()).finish()
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        // Store already gone: nothing left to release
        if let Some(inner) = self.store.upgrade() {
            inner.borrow_mut().entries.remove(&self.id);
        }
    }
}
