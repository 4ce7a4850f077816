//! Trader configuration, per-bar reports, and run result types.

use crate::domain::{Fill, OrderId, Position, Side};
use crate::engine::protocol::CrossingMode;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Configuration for a single trader run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TraderConfig {
    /// What part of the bar promotes conditional orders.
    pub trigger_mode: CrossingMode,
    /// What part of the bar executes pending limit/stop orders.
    pub execution_mode: CrossingMode,
}

/// Why an order scheduled for a bar never made it into the manager.
///
/// Validation failures are reported on the bar whose close refused the order.
/// Filing failures are reported on the following bar, when filing happens.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub order_id: OrderId,
    pub reason: String,
}

/// Everything that happened on one bar.
#[derive(Debug, Clone, Serialize)]
pub struct BarReport {
    pub timestamp: NaiveDateTime,
    /// Orders valid at this bar's close, filed at the start of the next bar.
    pub accepted: Vec<OrderId>,
    /// Orders filed this bar, bracket children included.
    pub submitted: Vec<OrderId>,
    pub rejected: Vec<Rejection>,
    /// Conditional orders promoted to pending.
    pub promoted: Vec<OrderId>,
    pub executed: Vec<OrderId>,
    /// OCO partners removed because their sibling executed.
    pub cancelled: Vec<OrderId>,
    pub fills: Vec<Fill>,
    /// Running positions after this bar.
    pub long: Position,
    pub short: Position,
}

impl BarReport {
    pub(crate) fn new(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            accepted: Vec::new(),
            submitted: Vec::new(),
            rejected: Vec::new(),
            promoted: Vec::new(),
            executed: Vec::new(),
            cancelled: Vec::new(),
            fills: Vec::new(),
            long: Position::empty(Side::Long),
            short: Position::empty(Side::Short),
        }
    }

    /// True if nothing changed on this bar.
    pub fn is_quiet(&self) -> bool {
        self.accepted.is_empty()
            && self.submitted.is_empty()
            && self.rejected.is_empty()
            && self.promoted.is_empty()
            && self.executed.is_empty()
            && self.cancelled.is_empty()
    }
}

/// Result of a complete run.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub bars: Vec<BarReport>,
    /// All fills, in execution order.
    pub fills: Vec<Fill>,
    pub long: Position,
    pub short: Position,
    /// Orders still filed, or accepted but not yet filed, when the bars ran out.
    pub open_orders: Vec<OrderId>,
}

impl RunResult {
    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn rejection_count(&self) -> usize {
        self.bars.iter().map(|b| b.rejected.len()).sum()
    }

    pub fn position(&self, side: Side) -> &Position {
        match side {
            Side::Long => &self.long,
            Side::Short => &self.short,
        }
    }
}
