//! Table: public API over `Chains`, wiring in the hook set, the growth policy
//! and the debug reentrancy guard.

use crate::chain::{Chains, Entry};
use crate::config::TableConfig;
use crate::error::Error;
use crate::hooks::{Hooks, OnRemove, PtrKey, PtrKeys, StrKeys};
use crate::reentrancy::HookScope;
use core::borrow::Borrow;
use core::iter::FusedIterator;
use core::ops::ControlFlow;
use slotmap::DefaultKey;

/// Stable handle to one table entry.
///
/// A handle stays valid across inserts, overwrites, deletes of other entries
/// and rehashes. Once its entry is deleted the handle never resolves again,
/// even if the arena slot is reused.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct EntryRef(DefaultKey);

impl EntryRef {
    pub(crate) fn new(k: DefaultKey) -> Self {
        EntryRef(k)
    }

    pub(crate) fn raw(&self) -> DefaultKey {
        self.0
    }

    pub fn key<'a, K, V, H>(&self, table: &'a Table<K, V, H>) -> Option<&'a K>
    where
        H: Hooks<K, V>,
    {
        table.key(*self)
    }

    pub fn value<'a, K, V, H>(&self, table: &'a Table<K, V, H>) -> Option<&'a V>
    where
        H: Hooks<K, V>,
    {
        table.value(*self)
    }

    pub fn value_mut<'a, K, V, H>(&self, table: &'a mut Table<K, V, H>) -> Option<&'a mut V>
    where
        H: Hooks<K, V>,
    {
        table.value_mut(*self)
    }
}

/// Separate-chaining hash table with stable entry handles.
///
/// Each bucket chains its entries most recent first; buckets holding at
/// least one entry are threaded on a table-wide list so traversal never
/// visits an empty slot. `put` doubles the bucket array once
/// `len() >= capacity() * load_factor()`.
pub struct Table<K, V, H: Hooks<K, V>> {
    chains: Chains<K, V>,
    load_factor: f64,
    hooks: H,
    hook_scope: HookScope,
}

impl<K, V, R> Table<K, V, StrKeys<R>>
where
    K: Borrow<str>,
    R: OnRemove<K, V>,
{
    /// Table keyed by strings, hashed with the multiplicative-33 string hash.
    pub fn with_str_keys(initial_capacity: usize, on_remove: R) -> Result<Self, Error> {
        Self::new(initial_capacity, StrKeys::new(on_remove))
    }
}

impl<K, V, T, R> Table<K, V, PtrKeys<T, R>>
where
    K: PtrKey<Target = T> + Borrow<T>,
    T: ?Sized,
    R: OnRemove<K, V>,
{
    /// Table keyed by referent identity (address).
    pub fn with_ptr_keys(initial_capacity: usize, on_remove: R) -> Result<Self, Error> {
        Self::new(initial_capacity, PtrKeys::new(on_remove))
    }
}

impl<K, V, H> Table<K, V, H>
where
    H: Hooks<K, V>,
{
    pub fn new(initial_capacity: usize, hooks: H) -> Result<Self, Error> {
        Self::with_config(
            TableConfig::default().with_initial_capacity(initial_capacity),
            hooks,
        )
    }

    pub fn with_config(config: TableConfig, hooks: H) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            chains: Chains::with_capacity(config.initial_capacity)?,
            load_factor: config.load_factor,
            hooks,
            hook_scope: HookScope::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.len() == 0
    }

    /// Current number of buckets.
    pub fn capacity(&self) -> usize {
        self.chains.capacity()
    }

    pub fn load_factor(&self) -> f64 {
        self.load_factor
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Whether `entry` still refers to a live entry of this table.
    pub fn contains(&self, entry: EntryRef) -> bool {
        self.chains.contains(entry.raw())
    }

    pub fn key(&self, entry: EntryRef) -> Option<&K> {
        self.chains.get(entry.raw()).map(|e| &e.key)
    }

    pub fn value(&self, entry: EntryRef) -> Option<&V> {
        self.chains.get(entry.raw()).map(|e| &e.value)
    }

    pub fn value_mut(&mut self, entry: EntryRef) -> Option<&mut V> {
        self.chains.get_mut(entry.raw()).map(|e| &mut e.value)
    }

    pub fn entry(&self, entry: EntryRef) -> Option<(&K, &V)> {
        self.chains.get(entry.raw()).map(|e| (&e.key, &e.value))
    }

    /// Unlink `entry`, release it and hand its key/value to the removal hook.
    ///
    /// Returns `false` without touching the table if the handle is stale.
    pub fn delete(&mut self, entry: EntryRef) -> bool {
        match self.chains.remove(entry.raw()) {
            Some((key, value)) => {
                self.hooks.on_remove(key, value);
                true
            }
            None => false,
        }
    }

    /// Rebuild the bucket array with `new_capacity` slots, moving every entry
    /// without reallocating it. Handles stay valid; traversal order changes.
    ///
    /// On error the table is unchanged.
    pub fn rehash(&mut self, new_capacity: usize) -> Result<(), Error> {
        let old_capacity = self.capacity();
        if let Err(e) = self.chains.rehash(new_capacity) {
            log::warn!(
                "rehash from {} to {} buckets failed: {}",
                old_capacity,
                new_capacity,
                e
            );
            return Err(e);
        }
        log::debug!(
            "rehashed {} entries from {} to {} buckets",
            self.len(),
            old_capacity,
            new_capacity
        );
        Ok(())
    }

    fn needs_growth(&self) -> bool {
        self.len() as f64 >= self.capacity() as f64 * self.load_factor
    }

    fn grow(&mut self) -> Result<(), Error> {
        let Some(target) = self.capacity().checked_mul(2) else {
            log::warn!("cannot grow past {} buckets", self.capacity());
            return Err(Error::CapacityOverflow);
        };
        log::trace!(
            "{} entries reached load factor {} at {} buckets; growing",
            self.len(),
            self.load_factor,
            self.capacity()
        );
        self.rehash(target)
    }

    pub fn first(&self) -> Option<EntryRef> {
        self.chains.first().map(EntryRef::new)
    }

    /// Last entry in traversal order. Walks the bucket list and one chain.
    pub fn last(&self) -> Option<EntryRef> {
        self.chains.last().map(EntryRef::new)
    }

    pub fn next(&self, entry: EntryRef) -> Option<EntryRef> {
        self.chains.next(entry.raw()).map(EntryRef::new)
    }

    /// Entry before `entry` in traversal order. Crossing into the previous
    /// bucket scans that bucket's chain to its tail.
    pub fn prev(&self, entry: EntryRef) -> Option<EntryRef> {
        self.chains.prev(entry.raw()).map(EntryRef::new)
    }

    /// Visit every entry in traversal order until `f` breaks.
    ///
    /// `f` may delete any entry. When the entry it was given survives, the
    /// walk continues from that entry's current successor; when it was
    /// deleted, from the successor read before `f` ran. If `f` deletes both
    /// the entry it was given and that successor, the walk ends there and
    /// still returns `Continue`. Entries inserted by `f` may or may not be
    /// visited, and a growth triggered by `f` reorders what remains.
    pub fn traverse<B, F>(&mut self, mut f: F) -> ControlFlow<B>
    where
        F: FnMut(&mut Self, EntryRef) -> ControlFlow<B>,
    {
        let mut cursor = self.chains.first();
        while let Some(k) = cursor {
            let snapshot = self.chains.next(k);
            f(self, EntryRef::new(k))?;
            cursor = if self.chains.contains(k) {
                self.chains.next(k)
            } else {
                snapshot.filter(|&n| self.chains.contains(n))
            };
        }
        ControlFlow::Continue(())
    }

    /// Remove every entry, handing each pair to the removal hook in traversal
    /// order. Capacity is kept.
    pub fn clear(&mut self) {
        while let Some(k) = self.chains.first() {
            if let Some((key, value)) = self.chains.remove(k) {
                self.hooks.on_remove(key, value);
            }
        }
    }

    /// Entries in traversal order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            chains: &self.chains,
            cursor: self.chains.first(),
            remaining: self.chains.len(),
        }
    }

    /// Mutable access to every entry, in arena order rather than traversal
    /// order.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            it: self.chains.entries_mut(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(_, k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, _, v)| v)
    }

    /// Panic if any structural invariant is broken.
    pub fn debug_validate(&self) {
        self.chains.validate();
    }
}

impl<K, V, H> Table<K, V, H>
where
    H: Hooks<K, V>,
    K: Borrow<H::Key>,
{
    fn find(&self, key: &H::Key, op: &'static str) -> Option<DefaultKey> {
        let _g = self.hook_scope.enter(op);
        let hash = self.hooks.hash(key);
        let hooks = &self.hooks;
        self.chains
            .find(hash, |stored| hooks.equals(stored.borrow(), key))
    }

    /// Handle of the entry stored under `key`, if any.
    pub fn get(&self, key: &H::Key) -> Option<EntryRef> {
        self.find(key, "get").map(EntryRef::new)
    }

    pub fn get_value(&self, key: &H::Key) -> Option<&V> {
        let k = self.find(key, "get_value")?;
        self.chains.get(k).map(|e| &e.value)
    }

    pub fn get_value_mut(&mut self, key: &H::Key) -> Option<&mut V> {
        let k = self.find(key, "get_value_mut")?;
        self.chains.get_mut(k).map(|e| &mut e.value)
    }

    pub fn contains_key(&self, key: &H::Key) -> bool {
        self.find(key, "contains_key").is_some()
    }

    /// Insert or overwrite.
    ///
    /// Grows first when the load limit is reached. A failed growth, or a
    /// failed allocation for the new entry, returns the error with every
    /// entry and handle as it was. Overwriting keeps the existing handle and
    /// passes the replaced key/value to the removal hook.
    pub fn put(&mut self, key: K, value: V) -> Result<EntryRef, Error> {
        if self.needs_growth() {
            self.grow()?;
        }

        let (hash, found) = {
            let _g = self.hook_scope.enter("put");
            let probe: &H::Key = key.borrow();
            let hash = self.hooks.hash(probe);
            let hooks = &self.hooks;
            let found = self
                .chains
                .find(hash, |stored| hooks.equals(stored.borrow(), probe));
            (hash, found)
        };

        match found {
            Some(k) => {
                if let Some((old_key, old_value)) = self.chains.replace(k, key, value) {
                    self.hooks.on_remove(old_key, old_value);
                }
                Ok(EntryRef::new(k))
            }
            None => {
                self.chains.try_reserve(1)?;
                Ok(EntryRef::new(self.chains.insert(hash, key, value)))
            }
        }
    }

    /// Delete the entry stored under `key`. Returns whether one existed.
    pub fn remove(&mut self, key: &H::Key) -> bool {
        match self.find(key, "remove") {
            Some(k) => self.delete(EntryRef::new(k)),
            None => false,
        }
    }
}

impl<K, V, H: Hooks<K, V>> Drop for Table<K, V, H> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<K, V, H> core::fmt::Debug for Table<K, V, H>
where
    K: core::fmt::Debug,
    V: core::fmt::Debug,
    H: Hooks<K, V>,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(_, k, v)| (k, v)))
            .finish()
    }
}

impl<'a, K, V, H: Hooks<K, V>> IntoIterator for &'a Table<K, V, H> {
    type Item = (EntryRef, &'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over entries in traversal order.
pub struct Iter<'a, K, V> {
    chains: &'a Chains<K, V>,
    cursor: Option<DefaultKey>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (EntryRef, &'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let k = self.cursor?;
        let chains: &'a Chains<K, V> = self.chains;
        let e: &'a Entry<K, V> = chains.get(k)?;
        self.cursor = chains.next(k);
        self.remaining = self.remaining.saturating_sub(1);
        Some((EntryRef::new(k), &e.key, &e.value))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

/// Iterator over mutable entries, in arena order.
pub struct IterMut<'a, K, V> {
    it: slotmap::basic::IterMut<'a, DefaultKey, Entry<K, V>>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (EntryRef, &'a K, &'a mut V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it
            .next()
            .map(|(k, e)| (EntryRef::new(k), &e.key, &mut e.value))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}
