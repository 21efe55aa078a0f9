//! Error type for table construction, growth and rehash.

use std::collections::TryReserveError;
use thiserror::Error;

/// Failures reported by [`Table`](crate::Table) operations.
///
/// Whenever one of these is returned the table is left exactly as it was
/// before the call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A bucket array of zero slots was requested.
    #[error("table capacity must be at least 1")]
    ZeroCapacity,

    /// The configured load factor is not in `(0, 1]`.
    #[error("load factor must be in (0, 1], got {0}")]
    InvalidLoadFactor(f64),

    /// Doubling the capacity on growth overflowed `usize`.
    #[error("capacity overflow while growing the bucket array")]
    CapacityOverflow,

    /// The bucket array could not be reserved.
    #[error("bucket array allocation failed: {0}")]
    Alloc(#[from] TryReserveError),
}
