//! Triggering and execution protocols.
//!
//! A protocol is a predicate over a single order, built fresh for each bar with
//! whatever bar context it needs. The order manager only asks yes/no questions
//! of it, so the crossing rule can change (intrabar range vs. bar close)
//! without touching manager code.

use crate::domain::{Bar, Order, OrderKind};
use serde::{Deserialize, Serialize};

/// Decides whether a conditional order is promoted to pending.
pub trait TriggeringProtocol {
    fn check_triggering(&self, order: &Order) -> bool;
}

/// Decides whether a pending order executes.
pub trait ExecutionProtocol {
    fn check_execution(&self, order: &Order) -> bool;
}

impl<F> TriggeringProtocol for F
where
    F: Fn(&Order) -> bool,
{
    fn check_triggering(&self, order: &Order) -> bool {
        self(order)
    }
}

impl<F> ExecutionProtocol for F
where
    F: Fn(&Order) -> bool,
{
    fn check_execution(&self, order: &Order) -> bool {
        self(order)
    }
}

/// Triggers when the bar's high/low range crosses the order's trigger level.
#[derive(Debug, Clone, Copy)]
pub struct IntrabarTrigger {
    pub high: f64,
    pub low: f64,
}

impl TriggeringProtocol for IntrabarTrigger {
    fn check_triggering(&self, order: &Order) -> bool {
        order.is_triggered(self.high, self.low)
    }
}

/// Triggers when the bar's close alone crosses the order's trigger level.
#[derive(Debug, Clone, Copy)]
pub struct CloseTrigger {
    pub close: f64,
}

impl TriggeringProtocol for CloseTrigger {
    fn check_triggering(&self, order: &Order) -> bool {
        order.is_triggered(self.close, self.close)
    }
}

/// Market orders execute as soon as they are pending; limit and stop orders
/// execute when the bar's range crosses their price.
#[derive(Debug, Clone, Copy)]
pub struct IntrabarExecution {
    pub high: f64,
    pub low: f64,
}

impl ExecutionProtocol for IntrabarExecution {
    fn check_execution(&self, order: &Order) -> bool {
        match order.kind() {
            OrderKind::Market => true,
            OrderKind::Limit | OrderKind::Stop => order.is_crossed(self.high, self.low),
        }
    }
}

/// Like [`IntrabarExecution`] but only the close counts as a crossing.
#[derive(Debug, Clone, Copy)]
pub struct CloseExecution {
    pub close: f64,
}

impl ExecutionProtocol for CloseExecution {
    fn check_execution(&self, order: &Order) -> bool {
        match order.kind() {
            OrderKind::Market => true,
            OrderKind::Limit | OrderKind::Stop => order.is_valid(self.close),
        }
    }
}

/// Which part of the bar a crossing check looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrossingMode {
    /// High/low range.
    #[default]
    Intrabar,
    /// Close only.
    Close,
}

impl CrossingMode {
    pub fn triggering(self, bar: &Bar) -> Box<dyn TriggeringProtocol> {
        match self {
            CrossingMode::Intrabar => Box::new(IntrabarTrigger {
                high: bar.high,
                low: bar.low,
            }),
            CrossingMode::Close => Box::new(CloseTrigger { close: bar.close }),
        }
    }

    pub fn execution(self, bar: &Bar) -> Box<dyn ExecutionProtocol> {
        match self {
            CrossingMode::Intrabar => Box::new(IntrabarExecution {
                high: bar.high,
                low: bar.low,
            }),
            CrossingMode::Close => Box::new(CloseExecution { close: bar.close }),
        }
    }
}
