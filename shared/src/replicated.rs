//! Change-tracked variables.
//!
//! A [`Replicated`] value carries a version counter that advances on every
//! [`Replicated::set`], including writes of an identical value. The replication
//! push compares versions against what it last sent, so a write is always
//! re-sent even if nothing observable changed.
//!
//! Concurrent access is governed by ownership rather than interior locking:
//! on the simulator the entity store is owned by the simulation thread, which
//! is the only writer; on an observer the mirror lives behind a lock and is
//! written only by the network task.

/// A single replicated field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Replicated<T: Copy> {
    value: T,
    version: u64,
}

impl<T: Copy> Replicated<T> {
    /// Creates a variable holding `value` at version 0.
    pub fn new(value: T) -> Self {
        Self { value, version: 0 }
    }

    /// Stores `value` and marks the variable changed.
    pub fn set(&mut self, value: T) {
        self.value = value;
        self.version = self.version.wrapping_add(1);
    }

    /// Returns the last stored value.
    pub fn get(&self) -> T {
        self.value
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

impl<T: Copy + Default> Default for Replicated<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
