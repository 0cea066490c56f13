//! Find-or-create resource caches.
//!
//! Every resource kind (textures, shader programs, compute programs, animation sheets) lives in a
//! [`HashedResourceCache`]. Entries are owned by the cache and addressed by a typed [`Handle`];
//! callers resolve the handle at the point of use instead of holding on to a reference, so a
//! reload that recreates backend objects never leaves anyone with a dangling resource.

use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::rc::Rc;
use std::time::Instant;

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    struct EntryKey;
}

/// A resource kind that can be stored in a [`HashedResourceCache`].
pub trait Resource {
    /// Structural identity of an entry.
    type Key: Eq + Hash + Clone + fmt::Debug;
    /// Arguments recorded on first load and replayed on reload. Plain owned values only.
    type Args: Clone + fmt::Debug;
}

/// Performs the actual (blocking) load of a resource and frees what it allocated.
pub trait Loader<R: Resource> {
    /// Loads the resource. Never fails: a failed load returns the resource in its invalid state.
    fn load(&mut self, key: &R::Key, args: &R::Args) -> R;

    /// Releases backend objects owned by `resource`.
    fn release(&mut self, _resource: &mut R) {}

    /// Replaces `resource` in place with a fresh load. Loaders that keep state across reloads
    /// (such as a reload counter) override this.
    fn reload(&mut self, key: &R::Key, args: &R::Args, resource: &mut R) {
        self.release(resource);
        *resource = self.load(key, args);
    }
}

/// Process-wide (well, context-wide) resource version counter, shared by every cache of a render
/// context. Incremented once per bulk reload.
#[derive(Debug, Clone, Default)]
pub struct ResourceVersion(Rc<Cell<u64>>);

impl ResourceVersion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> u64 {
        self.0.get()
    }

    pub fn bump(&self) -> u64 {
        let next = self.0.get().wrapping_add(1);
        self.0.set(next);
        next
    }
}

/// Lightweight, copyable reference to a cache entry. Becomes stale (resolves to `None`) once the
/// owning cache is cleared.
pub struct Handle<R> {
    key: EntryKey,
    _marker: PhantomData<fn() -> R>,
}

impl<R> Handle<R> {
    fn new(key: EntryKey) -> Self {
        Self {
            key,
            _marker: PhantomData,
        }
    }
}

impl<R> Clone for Handle<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for Handle<R> {}

impl<R> PartialEq for Handle<R> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<R> Eq for Handle<R> {}

impl<R> Hash for Handle<R> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl<R> fmt::Debug for Handle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({:?})", self.key)
    }
}

struct CacheEntry<R: Resource> {
    key: R::Key,
    args: R::Args,
    value: R,
}

pub struct HashedResourceCache<R: Resource> {
    label: &'static str,
    entries: SlotMap<EntryKey, CacheEntry<R>>,
    lookup: HashMap<R::Key, EntryKey>,
    version: ResourceVersion,
}

impl<R: Resource> HashedResourceCache<R> {
    pub fn new(label: &'static str, version: ResourceVersion) -> Self {
        Self {
            label,
            entries: SlotMap::with_key(),
            lookup: HashMap::new(),
            version,
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn version(&self) -> &ResourceVersion {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entry for `key`, loading it with `args` on a miss. A failed load still inserts
    /// an entry, so later lookups for the same key do not retry.
    pub fn find_or_create(
        &mut self,
        key: R::Key,
        args: R::Args,
        loader: &mut impl Loader<R>,
    ) -> Handle<R> {
        if let Some(&entry) = self.lookup.get(&key) {
            return Handle::new(entry);
        }

        let value = loader.load(&key, &args);
        let entry = self.entries.insert(CacheEntry {
            key: key.clone(),
            args,
            value,
        });
        self.lookup.insert(key, entry);
        Handle::new(entry)
    }

    pub fn find(&self, key: &R::Key) -> Option<Handle<R>> {
        self.lookup.get(key).copied().map(Handle::new)
    }

    pub fn get(&self, handle: Handle<R>) -> Option<&R> {
        self.entries.get(handle.key).map(|entry| &entry.value)
    }

    pub fn get_mut(&mut self, handle: Handle<R>) -> Option<&mut R> {
        self.entries.get_mut(handle.key).map(|entry| &mut entry.value)
    }

    pub fn key_of(&self, handle: Handle<R>) -> Option<&R::Key> {
        self.entries.get(handle.key).map(|entry| &entry.key)
    }

    pub fn args_of(&self, handle: Handle<R>) -> Option<&R::Args> {
        self.entries.get(handle.key).map(|entry| &entry.args)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<R>, &R::Key, &R)> {
        self.entries
            .iter()
            .map(|(key, entry)| (Handle::new(key), &entry.key, &entry.value))
    }

    /// Reloads every entry with its recorded arguments and bumps the resource version once.
    pub fn reload(&mut self, loader: &mut impl Loader<R>) {
        self.reload_entries(|_, _| true, loader);
        self.version.bump();
    }

    /// Reloads every entry without touching the resource version. Used when several caches are
    /// reloaded as one batch that bumps the version itself.
    pub(crate) fn reload_in_batch(&mut self, loader: &mut impl Loader<R>) {
        self.reload_entries(|_, _| true, loader);
    }

    /// Reloads the entries matching `filter`, returning how many were reloaded. Entry identity is
    /// preserved; the resource version is left alone.
    pub fn reload_where(
        &mut self,
        filter: impl Fn(&R::Key, &R::Args) -> bool,
        loader: &mut impl Loader<R>,
    ) -> usize {
        self.reload_entries(filter, loader)
    }

    /// Reloads a single entry. Returns false when the handle is stale.
    pub fn reload_entry(&mut self, handle: Handle<R>, loader: &mut impl Loader<R>) -> bool {
        match self.entries.get_mut(handle.key) {
            Some(entry) => {
                loader.reload(&entry.key, &entry.args, &mut entry.value);
                true
            }
            None => false,
        }
    }

    fn reload_entries(
        &mut self,
        filter: impl Fn(&R::Key, &R::Args) -> bool,
        loader: &mut impl Loader<R>,
    ) -> usize {
        let mut count = 0;
        for (_, entry) in self.entries.iter_mut() {
            if !filter(&entry.key, &entry.args) {
                continue;
            }
            loader.reload(&entry.key, &entry.args, &mut entry.value);
            count += 1;
        }
        count
    }

    /// Releases every entry and empties the cache. Outstanding handles become stale.
    pub fn clear(&mut self, loader: &mut impl Loader<R>) {
        for (_, entry) in self.entries.iter_mut() {
            loader.release(&mut entry.value);
        }
        self.entries.clear();
        self.lookup.clear();
    }
}

/// Logs how long a blocking load took. The benchmarking hook for first-lookup stalls.
pub struct LoadTimer<'a> {
    name: &'a str,
    start: Instant,
}

impl<'a> LoadTimer<'a> {
    pub fn new(name: &'a str) -> Self {
        log::debug!("load {} [begin]", name);
        Self {
            name,
            start: Instant::now(),
        }
    }
}

impl Drop for LoadTimer<'_> {
    fn drop(&mut self) {
        log::debug!(
            "load {} [end] took {:.2}ms",
            self.name,
            self.start.elapsed().as_secs_f64() * 1000.0
        );
    }
}
