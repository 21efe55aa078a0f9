//! Hook sets: how a table hashes and compares keys, and what it does with a
//! key/value pair once the table lets go of it.

use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use core::marker::PhantomData;
use hashbrown::hash_map::DefaultHashBuilder;
use std::rc::Rc;
use std::sync::Arc;

/// Key hashing, key equality and the removal callback for a table.
///
/// `equals(a, b)` must be an equivalence relation and must imply
/// `hash(a) == hash(b)`. Both must be deterministic for as long as a key is
/// stored.
pub trait Hooks<K, V> {
    /// Borrowed form used for lookups; stored keys are viewed through
    /// `K: Borrow<Self::Key>`.
    type Key: ?Sized;

    fn hash(&self, key: &Self::Key) -> u64;

    fn equals(&self, stored: &Self::Key, probe: &Self::Key) -> bool;

    /// Called exactly once for every pair the table releases: the old pair on
    /// overwrite, and the entry's pair on delete, clear and drop. The default
    /// drops both.
    fn on_remove(&mut self, key: K, value: V) {
        let _ = (key, value);
    }
}

/// Removal callback carried by the canonical hook sets. `()` means "just drop
/// the pair"; any `FnMut(K, V)` is called with it.
pub trait OnRemove<K, V> {
    fn on_remove(&mut self, key: K, value: V);
}

impl<K, V> OnRemove<K, V> for () {
    #[inline]
    fn on_remove(&mut self, _key: K, _value: V) {}
}

impl<K, V, F> OnRemove<K, V> for F
where
    F: FnMut(K, V),
{
    #[inline]
    fn on_remove(&mut self, key: K, value: V) {
        self(key, value)
    }
}

/// Rolling multiplicative-33 hash over the bytes of `s`, seeded with 1.
pub fn str_hash(s: &str) -> u64 {
    s.bytes()
        .fold(1u64, |h, b| h.wrapping_mul(33).wrapping_add(u64::from(b)))
}

/// Multiplicative scramble of an address, shifted to discard the low bits
/// that alignment keeps constant.
pub fn ptr_hash(addr: usize) -> u64 {
    (addr as u64).wrapping_mul(0x9e37_0001) >> 4
}

#[inline]
fn addr_of<T: ?Sized>(r: &T) -> usize {
    (r as *const T).cast::<()>() as usize
}

/// Hooks for string keys: any `K: Borrow<str>` (`String`, `&str`,
/// `Box<str>`, `Rc<str>`), looked up by `&str`.
#[derive(Clone, Debug, Default)]
pub struct StrKeys<R = ()> {
    on_remove: R,
}

impl<R> StrKeys<R> {
    pub fn new(on_remove: R) -> Self {
        Self { on_remove }
    }
}

impl<K, V, R> Hooks<K, V> for StrKeys<R>
where
    K: Borrow<str>,
    R: OnRemove<K, V>,
{
    type Key = str;

    #[inline]
    fn hash(&self, key: &str) -> u64 {
        str_hash(key)
    }

    #[inline]
    fn equals(&self, stored: &str, probe: &str) -> bool {
        stored == probe
    }

    #[inline]
    fn on_remove(&mut self, key: K, value: V) {
        self.on_remove.on_remove(key, value)
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Keys that point at their referent: `&T`, `Box<T>`, `Rc<T>` and `Arc<T>`.
/// Moving such a key into the table leaves the referent where it was, so its
/// address can serve as identity.
///
/// Owned values are not pointer keys:
///
/// ```compile_fail
/// use chain_table::{PtrKeys, Table};
///
/// let t: Table<u64, u32, PtrKeys<u64>> = Table::with_ptr_keys(8, ()).unwrap();
/// ```
pub trait PtrKey: sealed::Sealed {
    type Target: ?Sized;
}

impl<T: ?Sized> sealed::Sealed for &T {}
impl<T: ?Sized> PtrKey for &T {
    type Target = T;
}

impl<T: ?Sized> sealed::Sealed for Box<T> {}
impl<T: ?Sized> PtrKey for Box<T> {
    type Target = T;
}

impl<T: ?Sized> sealed::Sealed for Rc<T> {}
impl<T: ?Sized> PtrKey for Rc<T> {
    type Target = T;
}

impl<T: ?Sized> sealed::Sealed for Arc<T> {}
impl<T: ?Sized> PtrKey for Arc<T> {
    type Target = T;
}

/// Hooks for identity keys: any [`PtrKey`] compared and hashed by the address
/// of the referent.
///
/// Distinct zero-sized values may share an address and then compare equal.
pub struct PtrKeys<T: ?Sized, R = ()> {
    on_remove: R,
    _pd: PhantomData<fn(&T)>,
}

impl<T: ?Sized, R> PtrKeys<T, R> {
    pub fn new(on_remove: R) -> Self {
        Self {
            on_remove,
            _pd: PhantomData,
        }
    }
}

impl<T: ?Sized, R: Default> Default for PtrKeys<T, R> {
    fn default() -> Self {
        Self::new(R::default())
    }
}

impl<T: ?Sized, R: core::fmt::Debug> core::fmt::Debug for PtrKeys<T, R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PtrKeys")
            .field("on_remove", &self.on_remove)
            .finish()
    }
}

impl<K, V, T, R> Hooks<K, V> for PtrKeys<T, R>
where
    K: PtrKey<Target = T> + Borrow<T>,
    T: ?Sized,
    R: OnRemove<K, V>,
{
    type Key = T;

    #[inline]
    fn hash(&self, key: &T) -> u64 {
        ptr_hash(addr_of(key))
    }

    #[inline]
    fn equals(&self, stored: &T, probe: &T) -> bool {
        addr_of(stored) == addr_of(probe)
    }

    #[inline]
    fn on_remove(&mut self, key: K, value: V) {
        self.on_remove.on_remove(key, value)
    }
}

/// Hooks for `K: Hash + Eq`, hashing through a `BuildHasher` the way a
/// std-style map does.
#[derive(Clone, Debug)]
pub struct HashKeys<S = DefaultHashBuilder, R = ()> {
    build_hasher: S,
    on_remove: R,
}

impl HashKeys {
    pub fn new() -> Self {
        Self::with_hasher(DefaultHashBuilder::default())
    }
}

impl Default for HashKeys {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> HashKeys<S> {
    pub fn with_hasher(build_hasher: S) -> Self {
        Self {
            build_hasher,
            on_remove: (),
        }
    }
}

impl<S, R> HashKeys<S, R> {
    /// Replace the removal callback.
    pub fn with_on_remove<R2>(self, on_remove: R2) -> HashKeys<S, R2> {
        HashKeys {
            build_hasher: self.build_hasher,
            on_remove,
        }
    }
}

impl<K, V, S, R> Hooks<K, V> for HashKeys<S, R>
where
    K: Hash + Eq,
    S: BuildHasher,
    R: OnRemove<K, V>,
{
    type Key = K;

    #[inline]
    fn hash(&self, key: &K) -> u64 {
        self.build_hasher.hash_one(key)
    }

    #[inline]
    fn equals(&self, stored: &K, probe: &K) -> bool {
        stored == probe
    }

    #[inline]
    fn on_remove(&mut self, key: K, value: V) {
        self.on_remove.on_remove(key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn str_hash_known_values() {
        assert_eq!(str_hash(""), 1);
        assert_eq!(str_hash("a"), 33 + 97);
        assert_eq!(str_hash("ab"), (33 + 97) * 33 + 98);
    }

    #[test]
    fn str_keys_accept_any_borrow_str() {
        let h = StrKeys::new(());
        let owned = String::from("Ohio");
        let boxed: Box<str> = "Ohio".into();
        assert_eq!(
            Hooks::<String, ()>::hash(&h, owned.as_str()),
            Hooks::<Box<str>, ()>::hash(&h, &boxed)
        );
        assert!(Hooks::<String, ()>::equals(&h, "Ohio", "Ohio"));
        assert!(!Hooks::<String, ()>::equals(&h, "Ohio", "Iowa"));
    }

    /// Invariant: pointer keys compare by referent address, not by value.
    #[test]
    fn ptr_keys_compare_by_address() {
        let h: PtrKeys<i32> = PtrKeys::default();
        let a = 7;
        let b = 7;
        assert!(Hooks::<&i32, ()>::equals(&h, &a, &a));
        assert!(!Hooks::<&i32, ()>::equals(&h, &a, &b));
        assert_eq!(
            Hooks::<&i32, ()>::hash(&h, &a),
            ptr_hash(&a as *const i32 as usize)
        );
    }

    #[test]
    fn ptr_hash_drops_low_bits() {
        assert_eq!(ptr_hash(0), 0);
        assert_eq!(ptr_hash(1), 0x9e37_0001 >> 4);
    }

    #[test]
    fn closure_on_remove_receives_pair() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let mut h = StrKeys::new(move |k: String, v: i32| sink.borrow_mut().push((k, v)));
        Hooks::<String, i32>::on_remove(&mut h, "x".to_string(), 3);
        assert_eq!(*RefCell::borrow(&seen), vec![("x".to_string(), 3)]);
    }

    #[test]
    fn hash_keys_are_consistent_with_eq() {
        let h = HashKeys::new();
        let a = (1u32, "k");
        assert_eq!(
            Hooks::<(u32, &str), ()>::hash(&h, &a),
            Hooks::<(u32, &str), ()>::hash(&h, &(1u32, "k"))
        );
        assert!(Hooks::<(u32, &str), ()>::equals(&h, &a, &(1, "k")));
    }
}
