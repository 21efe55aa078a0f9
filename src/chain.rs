//! Chains: structural layer holding the bucket array, the entry arena and the
//! table-wide list of non-empty buckets. Never calls into user code.
//!
//! Buckets are addressed by array index and entries by generational arena key,
//! so every link is an `Option` of a plain index. Rehashing replaces only the
//! bucket array; entries keep their arena keys and are re-threaded in place.

use crate::error::Error;
use slotmap::{DefaultKey, SlotMap};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Bucket {
    head: Option<DefaultKey>,
    // Links in the non-empty list; both None while `head` is None.
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug)]
pub(crate) struct Entry<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) hash: u64,
    bucket: usize,
    prev: Option<DefaultKey>,
    next: Option<DefaultKey>,
}

#[derive(Debug)]
pub(crate) struct Chains<K, V> {
    buckets: Vec<Bucket>,
    entries: SlotMap<DefaultKey, Entry<K, V>>,
    nonempty_head: Option<usize>,
}

fn alloc_buckets(capacity: usize) -> Result<Vec<Bucket>, Error> {
    if capacity == 0 {
        return Err(Error::ZeroCapacity);
    }
    let mut buckets = Vec::new();
    buckets.try_reserve_exact(capacity)?;
    buckets.resize(capacity, Bucket::default());
    Ok(buckets)
}

impl<K, V> Chains<K, V> {
    pub(crate) fn with_capacity(capacity: usize) -> Result<Self, Error> {
        Ok(Self {
            buckets: alloc_buckets(capacity)?,
            entries: SlotMap::with_key(),
            nonempty_head: None,
        })
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    fn bucket_of(&self, hash: u64) -> usize {
        (hash % self.buckets.len() as u64) as usize
    }

    #[inline]
    pub(crate) fn contains(&self, k: DefaultKey) -> bool {
        self.entries.contains_key(k)
    }

    #[inline]
    pub(crate) fn get(&self, k: DefaultKey) -> Option<&Entry<K, V>> {
        self.entries.get(k)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, k: DefaultKey) -> Option<&mut Entry<K, V>> {
        self.entries.get_mut(k)
    }

    /// Scan the chain selected by `hash` and return the first entry whose
    /// cached hash matches and whose key satisfies `eq`.
    pub(crate) fn find<F>(&self, hash: u64, mut eq: F) -> Option<DefaultKey>
    where
        F: FnMut(&K) -> bool,
    {
        let mut cursor = self.buckets[self.bucket_of(hash)].head;
        while let Some(k) = cursor {
            let e = &self.entries[k];
            if e.hash == hash && eq(&e.key) {
                return Some(k);
            }
            cursor = e.next;
        }
        None
    }

    /// Reserve arena room for `additional` more entries. On error nothing
    /// has changed.
    pub(crate) fn try_reserve(&mut self, additional: usize) -> Result<(), Error> {
        self.entries.try_reserve(additional)?;
        Ok(())
    }

    /// Allocate a new entry and link it at the head of its bucket chain.
    pub(crate) fn insert(&mut self, hash: u64, key: K, value: V) -> DefaultKey {
        let idx = self.bucket_of(hash);
        let k = self.entries.insert(Entry {
            key,
            value,
            hash,
            bucket: idx,
            prev: None,
            next: None,
        });
        self.link(k, idx);
        k
    }

    /// Swap in a new key/value for a live entry, returning the old pair.
    /// Links and bucket membership are untouched.
    pub(crate) fn replace(&mut self, k: DefaultKey, key: K, value: V) -> Option<(K, V)> {
        let e = self.entries.get_mut(k)?;
        let old_key = core::mem::replace(&mut e.key, key);
        let old_value = core::mem::replace(&mut e.value, value);
        Some((old_key, old_value))
    }

    /// Unlink and release an entry. Returns `None` for a stale key.
    pub(crate) fn remove(&mut self, k: DefaultKey) -> Option<(K, V)> {
        let entry = self.entries.remove(k)?;
        match entry.prev {
            Some(p) => self.entries[p].next = entry.next,
            None => self.buckets[entry.bucket].head = entry.next,
        }
        if let Some(n) = entry.next {
            self.entries[n].prev = entry.prev;
        }
        if self.buckets[entry.bucket].head.is_none() {
            self.unlink_bucket(entry.bucket);
        }
        Some((entry.key, entry.value))
    }

    /// Rebuild the bucket array at `capacity` and re-thread every entry into
    /// it. On error nothing has been touched.
    pub(crate) fn rehash(&mut self, capacity: usize) -> Result<(), Error> {
        let fresh = alloc_buckets(capacity)?;
        let old = core::mem::replace(&mut self.buckets, fresh);
        let mut bucket_cursor = self.nonempty_head.take();
        while let Some(b) = bucket_cursor {
            bucket_cursor = old[b].next;
            let mut cursor = old[b].head;
            while let Some(k) = cursor {
                // `link` rewrites `next`, so read it first.
                cursor = self.entries[k].next;
                let idx = self.bucket_of(self.entries[k].hash);
                self.link(k, idx);
            }
        }
        Ok(())
    }

    fn link(&mut self, k: DefaultKey, idx: usize) {
        let old_head = self.buckets[idx].head;
        {
            let e = &mut self.entries[k];
            e.bucket = idx;
            e.prev = None;
            e.next = old_head;
        }
        match old_head {
            Some(h) => self.entries[h].prev = Some(k),
            None => self.push_bucket(idx),
        }
        self.buckets[idx].head = Some(k);
    }

    fn push_bucket(&mut self, idx: usize) {
        let old_first = self.nonempty_head;
        self.buckets[idx].prev = None;
        self.buckets[idx].next = old_first;
        if let Some(f) = old_first {
            self.buckets[f].prev = Some(idx);
        }
        self.nonempty_head = Some(idx);
    }

    fn unlink_bucket(&mut self, idx: usize) {
        let Bucket { prev, next, .. } = self.buckets[idx];
        match prev {
            Some(p) => self.buckets[p].next = next,
            None => self.nonempty_head = next,
        }
        if let Some(n) = next {
            self.buckets[n].prev = prev;
        }
        self.buckets[idx].prev = None;
        self.buckets[idx].next = None;
    }

    fn chain_tail(&self, idx: usize) -> Option<DefaultKey> {
        let mut cursor = self.buckets[idx].head?;
        while let Some(n) = self.entries[cursor].next {
            cursor = n;
        }
        Some(cursor)
    }

    pub(crate) fn first(&self) -> Option<DefaultKey> {
        self.nonempty_head.and_then(|b| self.buckets[b].head)
    }

    pub(crate) fn last(&self) -> Option<DefaultKey> {
        let mut b = self.nonempty_head?;
        while let Some(n) = self.buckets[b].next {
            b = n;
        }
        self.chain_tail(b)
    }

    pub(crate) fn next(&self, k: DefaultKey) -> Option<DefaultKey> {
        let e = self.entries.get(k)?;
        if e.next.is_some() {
            return e.next;
        }
        self.buckets[e.bucket]
            .next
            .and_then(|b| self.buckets[b].head)
    }

    pub(crate) fn prev(&self, k: DefaultKey) -> Option<DefaultKey> {
        let e = self.entries.get(k)?;
        if e.prev.is_some() {
            return e.prev;
        }
        self.buckets[e.bucket]
            .prev
            .and_then(|b| self.chain_tail(b))
    }

    pub(crate) fn entries_mut(&mut self) -> slotmap::basic::IterMut<'_, DefaultKey, Entry<K, V>> {
        self.entries.iter_mut()
    }

    /// Walk the whole structure and panic on any broken link or count.
    pub(crate) fn validate(&self) {
        let cap = self.buckets.len();
        let mut in_list = vec![false; cap];
        let mut seen = 0usize;
        let mut prev_bucket: Option<usize> = None;
        let mut bucket_cursor = self.nonempty_head;

        while let Some(b) = bucket_cursor {
            assert!(b < cap, "bucket index {b} out of range (capacity {cap})");
            assert!(!in_list[b], "bucket {b} appears twice in the non-empty list");
            in_list[b] = true;
            let bucket = &self.buckets[b];
            assert_eq!(
                bucket.prev, prev_bucket,
                "bucket {b} has a wrong back link in the non-empty list"
            );
            let head = bucket
                .head
                .unwrap_or_else(|| panic!("empty bucket {b} is in the non-empty list"));
            assert!(
                self.entries[head].prev.is_none(),
                "chain head of bucket {b} has a predecessor"
            );

            let mut prev_entry: Option<DefaultKey> = None;
            let mut cursor = Some(head);
            while let Some(k) = cursor {
                let e = self
                    .entries
                    .get(k)
                    .unwrap_or_else(|| panic!("bucket {b} links to a released entry"));
                assert_eq!(e.bucket, b, "entry records the wrong owning bucket");
                assert_eq!(e.prev, prev_entry, "entry has a wrong back link");
                assert_eq!(
                    self.bucket_of(e.hash),
                    b,
                    "entry sits in a bucket its hash does not select"
                );
                seen += 1;
                assert!(seen <= self.entries.len(), "chains hold more entries than the arena");
                prev_entry = Some(k);
                cursor = e.next;
            }

            prev_bucket = Some(b);
            bucket_cursor = bucket.next;
        }

        for (b, bucket) in self.buckets.iter().enumerate() {
            if !in_list[b] {
                assert_eq!(
                    *bucket,
                    Bucket::default(),
                    "bucket {b} is outside the non-empty list but not empty"
                );
            }
        }
        assert_eq!(seen, self.entries.len(), "arena holds unreachable entries");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys_in_order<K, V>(c: &Chains<K, V>) -> Vec<DefaultKey> {
        let mut out = Vec::new();
        let mut cursor = c.first();
        while let Some(k) = cursor {
            out.push(k);
            cursor = c.next(k);
        }
        out
    }

    /// Invariant: a zero-sized bucket array is rejected up front.
    #[test]
    fn zero_capacity_rejected() {
        assert!(matches!(
            Chains::<u32, u32>::with_capacity(0),
            Err(Error::ZeroCapacity)
        ));
    }

    /// Invariant: entries sharing a bucket are chained most recent first, and
    /// the bucket joins the non-empty list only once.
    #[test]
    fn same_bucket_chains_most_recent_first() {
        let mut c: Chains<&str, i32> = Chains::with_capacity(4).unwrap();
        let a = c.insert(1, "a", 1);
        let b = c.insert(5, "b", 2);
        let d = c.insert(9, "d", 3);
        c.validate();
        assert_eq!(keys_in_order(&c), vec![d, b, a]);
        assert_eq!(c.last(), Some(a));
    }

    /// Invariant: removing the middle, head and last entry of a chain keeps
    /// neighbours linked and drops the bucket from the list once empty.
    #[test]
    fn remove_patches_links_and_unlinks_empty_bucket() {
        let mut c: Chains<&str, i32> = Chains::with_capacity(4).unwrap();
        let a = c.insert(1, "a", 1);
        let b = c.insert(5, "b", 2);
        let d = c.insert(9, "d", 3);
        let other = c.insert(2, "o", 4);

        assert_eq!(c.remove(b), Some(("b", 2)));
        c.validate();
        assert_eq!(c.remove(d), Some(("d", 3)));
        c.validate();
        assert_eq!(c.remove(a), Some(("a", 1)));
        c.validate();
        assert_eq!(keys_in_order(&c), vec![other]);
        assert_eq!(c.remove(a), None, "stale key must not resolve");
        assert_eq!(c.remove(other), Some(("o", 4)));
        c.validate();
        assert_eq!(c.first(), None);
        assert_eq!(c.last(), None);
    }

    /// Invariant: removing the first bucket of the non-empty list moves the
    /// list head to its successor.
    #[test]
    fn removing_first_bucket_moves_list_head() {
        let mut c: Chains<u8, ()> = Chains::with_capacity(8).unwrap();
        let x = c.insert(1, 1, ());
        let y = c.insert(2, 2, ());
        assert_eq!(c.first(), Some(y));
        c.remove(y);
        c.validate();
        assert_eq!(c.first(), Some(x));
    }

    /// Invariant: rehash keeps every arena key, moves entries into the buckets
    /// their hashes select, and leaves the structure consistent.
    #[test]
    fn rehash_relinks_without_reallocating() {
        let mut c: Chains<u64, u64> = Chains::with_capacity(2).unwrap();
        let keys: Vec<_> = (0..20u64).map(|h| c.insert(h, h, h * 10)).collect();
        c.validate();
        c.rehash(7).unwrap();
        c.validate();
        assert_eq!(c.capacity(), 7);
        assert_eq!(c.len(), 20);
        for (h, k) in keys.iter().enumerate() {
            let e = c.get(*k).expect("entry survives rehash");
            assert_eq!(e.key, h as u64);
            assert_eq!(e.value, h as u64 * 10);
        }
    }

    /// Invariant: a failed rehash leaves capacity and links untouched.
    #[test]
    fn failed_rehash_is_a_no_op() {
        let mut c: Chains<u64, u64> = Chains::with_capacity(3).unwrap();
        for h in 0..5u64 {
            c.insert(h, h, h);
        }
        let before = keys_in_order(&c);
        assert!(matches!(c.rehash(usize::MAX), Err(Error::Alloc(_))));
        assert!(matches!(c.rehash(0), Err(Error::ZeroCapacity)));
        c.validate();
        assert_eq!(c.capacity(), 3);
        assert_eq!(keys_in_order(&c), before);
    }

    /// Invariant: an entry reservation the arena cannot satisfy surfaces as
    /// `Error::Alloc` and leaves the chains as they were.
    #[test]
    fn failed_entry_reservation_is_reported() {
        let mut c: Chains<u64, u64> = Chains::with_capacity(4).unwrap();
        assert!(matches!(c.try_reserve(usize::MAX), Err(Error::Alloc(_))));
        assert_eq!(c.len(), 0);
        assert_eq!(c.first(), None);
        c.validate();

        c.try_reserve(1).unwrap();
        let k = c.insert(9, 9, 90);
        assert_eq!(c.get(k).map(|e| e.value), Some(90));
        c.validate();
    }

    /// Invariant: `prev` walks the exact reverse of `next`, crossing bucket
    /// boundaries via the chain tail of the previous bucket.
    #[test]
    fn prev_mirrors_next() {
        let mut c: Chains<u64, ()> = Chains::with_capacity(5).unwrap();
        for h in [0u64, 5, 10, 1, 3, 8, 4] {
            c.insert(h, h, ());
        }
        let forward = keys_in_order(&c);
        let mut backward = Vec::new();
        let mut cursor = c.last();
        while let Some(k) = cursor {
            backward.push(k);
            cursor = c.prev(k);
        }
        backward.reverse();
        assert_eq!(forward, backward);
    }
}
