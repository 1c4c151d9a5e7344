// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::error::TemplateError;
use crate::renderer::CompiledTemplate;
use crate::Rc;

use core::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

/// Fixed-capacity LRU map keyed by template source text.
///
/// Every `get` and `set` marks the entry most recently used; inserting into a
/// full cache evicts exactly one entry, the least recently used. The map is
/// behind a mutex so a cache can be shared between threads by reference.
pub struct TemplateCache<V> {
    entries: Mutex<LruCache<String, V>>,
}

/// Compiled render artifacts keyed by template source.
pub type RenderCache = TemplateCache<Rc<CompiledTemplate>>;

impl<V: Clone> TemplateCache<V> {
    pub fn new(capacity: usize) -> Result<Self, TemplateError> {
        match NonZeroUsize::new(capacity) {
            Some(cap) => Ok(Self::with_capacity(cap)),
            None => Err(TemplateError::InvalidCacheCapacity { capacity }),
        }
    }

    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.entries.lock().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        self.entries.lock().put(key.into(), value);
    }

    /// Membership test; does not affect recency.
    pub fn has(&self, key: &str) -> bool {
        self.entries.lock().contains(key)
    }

    pub fn delete(&self, key: &str) -> bool {
        self.entries.lock().pop(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn size(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }
}

impl<V> core::fmt::Debug for TemplateCache<V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let entries = self.entries.lock();
        f.debug_struct("TemplateCache")
            .field("size", &entries.len())
            .field("capacity", &entries.cap())
            .finish()
    }
}
