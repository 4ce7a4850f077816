use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// Global counter for position IDs
static POSITION_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Order ID. Opaque outside this crate: assigned once at creation, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for OrderId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Position identity. Every constructed or merged position gets a fresh one,
/// so two positions with the same side, size and price are still distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PositionId(u64);

impl PositionId {
    pub fn fresh() -> Self {
        Self(POSITION_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for PositionId {
    fn default() -> Self {
        Self::fresh()
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pos_{}", self.0)
    }
}

/// Deterministic monotonic order ID generator.
///
/// IDs start at 1. Two runs that create orders in the same sequence get the
/// same IDs, which keeps reports reproducible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdGen {
    next: u64,
}

impl IdGen {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Start generating from `next`.
    pub fn starting_at(next: u64) -> Self {
        Self { next: next.max(1) }
    }

    pub fn next_order_id(&mut self) -> OrderId {
        let id = OrderId(self.next);
        self.next += 1;
        id
    }

    /// The ID the next call to `next_order_id` will return.
    pub fn peek(&self) -> OrderId {
        OrderId(self.next)
    }

    /// Advance past `id` so a generated ID can never collide with it.
    pub fn observe(&mut self, id: OrderId) {
        if id.0 >= self.next {
            self.next = id.0 + 1;
        }
    }
}

impl Default for IdGen {
    fn default() -> Self {
        Self::new()
    }
}
