//! chain-table: a single-threaded separate-chaining hash table whose entries
//! are addressed by stable handles and traversed in O(1) steps.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a hash table usable as a building block (symbol tables, caches,
//!   indices) where a reference to one entry survives unrelated mutations,
//!   including growth.
//! - Layers:
//!   - Chains<K, V>: structural layer. A bucket array, an entry arena and a
//!     doubly-linked list of non-empty buckets. Entries are chained per
//!     bucket through prev/next links. Never calls user code.
//!   - Table<K, V, H>: public API. Adds the hook set (hash, equals,
//!     on_remove), the load-factor growth policy and a debug-only
//!     reentrancy guard around hook calls.
//!
//! Constraints
//! - Single-threaded: `Table` is `!Sync`; it may be moved between threads.
//! - Buckets are addressed by index, entries by generational arena key. All
//!   links are `Option`s of those; no unsafe code.
//! - Handles (`EntryRef`) are stable across put, delete of other entries and
//!   rehash. Stale handles never resolve.
//! - Lookup, insert and delete are O(1) expected; each traversal step is
//!   O(1) except `prev` crossing into an earlier bucket, which scans that
//!   bucket's chain to its tail.
//!
//! Hooks
//! - `Hooks::hash`/`Hooks::equals` run during lookup only, under the
//!   reentrancy guard. Each entry caches its hash, so rehash never calls
//!   back into user code.
//! - `Hooks::on_remove` receives each released key/value pair exactly once:
//!   the old pair on overwrite, the entry's pair on delete, clear and drop.
//!   It runs after the structure is consistent again.
//!
//! Failure semantics
//! - Bucket arrays are reserved fallibly. A failed growth or rehash returns
//!   an `Error` and leaves the table untouched.
//! - Misuse with a stale handle is reported as `None`/`false`.
//!
//! Traversal order
//! - Most recently inserted first within a bucket; buckets in the order they
//!   last became non-empty, most recent first. Not stable across rehash.

mod chain;
mod chain_proptest;
mod config;
mod error;
pub mod hooks;
mod reentrancy;
mod table;

// Public surface
pub use config::{TableConfig, DEFAULT_INITIAL_CAPACITY, DEFAULT_LOAD_FACTOR};
pub use error::Error;
pub use hooks::{HashKeys, Hooks, OnRemove, PtrKey, PtrKeys, StrKeys};
pub use table::{EntryRef, Iter, IterMut, Table};
