//! Lazily computed, memoized values
//!
//! Used so the registry client and the registry subject list are each built
//! at most once per run, and only when a file actually needs them.

use std::cell::OnceCell;
use std::fmt;

/// A value computed by a fallible producer on first access and cached after.
///
/// A failed computation is not cached; the next access runs the producer again.
/// `Memoized` is `!Sync`, so concurrent first access cannot happen. A parallel
/// pipeline would have to compute the value up front instead.
pub struct Memoized<'a, T, E> {
    cell: OnceCell<T>,
    producer: Box<dyn Fn() -> Result<T, E> + 'a>,
}

impl<'a, T, E> Memoized<'a, T, E> {
    /// Wrap a producer without running it
    pub fn new(producer: impl Fn() -> Result<T, E> + 'a) -> Self {
        Self {
            cell: OnceCell::new(),
            producer: Box::new(producer),
        }
    }

    /// Get the value, running the producer if it has not succeeded yet
    pub fn get(&self) -> Result<&T, E> {
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }
        let value = (self.producer)()?;
        Ok(self.cell.get_or_init(|| value))
    }

    /// Whether the producer has already run successfully
    pub fn is_computed(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T: fmt::Debug, E> fmt::Debug for Memoized<'_, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoized").field("value", &self.cell.get()).finish()
    }
}
