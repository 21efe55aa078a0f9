//! Construction-time settings.

use crate::error::Error;

/// Occupancy ratio at which `put` doubles the bucket array.
pub const DEFAULT_LOAD_FACTOR: f64 = 0.66;

/// Bucket count used by [`TableConfig::default`].
pub const DEFAULT_INITIAL_CAPACITY: usize = 8;

/// Initial capacity and growth threshold of a table. Both are fixed once the
/// table is built; only an explicit `rehash` or growth changes the capacity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TableConfig {
    pub initial_capacity: usize,
    pub load_factor: f64,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            load_factor: DEFAULT_LOAD_FACTOR,
        }
    }
}

impl TableConfig {
    pub fn with_initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    pub fn with_load_factor(mut self, load_factor: f64) -> Self {
        self.load_factor = load_factor;
        self
    }

    /// Reject a zero capacity and any load factor outside `(0, 1]`
    /// (including NaN).
    pub fn validate(&self) -> Result<(), Error> {
        if self.initial_capacity == 0 {
            return Err(Error::ZeroCapacity);
        }
        if !(self.load_factor > 0.0 && self.load_factor <= 1.0) {
            return Err(Error::InvalidLoadFactor(self.load_factor));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let c = TableConfig::default();
        assert_eq!(c.initial_capacity, 8);
        assert_eq!(c.load_factor, 0.66);
        assert_eq!(c.validate(), Ok(()));
    }

    #[test]
    fn rejects_out_of_range_values() {
        let c = TableConfig::default();
        assert_eq!(
            c.with_initial_capacity(0).validate(),
            Err(Error::ZeroCapacity)
        );
        assert!(matches!(
            c.with_load_factor(0.0).validate(),
            Err(Error::InvalidLoadFactor(_))
        ));
        assert!(matches!(
            c.with_load_factor(1.5).validate(),
            Err(Error::InvalidLoadFactor(_))
        ));
        assert!(matches!(
            c.with_load_factor(f64::NAN).validate(),
            Err(Error::InvalidLoadFactor(_))
        ));
        assert_eq!(c.with_load_factor(1.0).validate(), Ok(()));
    }
}
