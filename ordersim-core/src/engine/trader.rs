//! Bar-by-bar trader: feeds the plan into the order manager.
//!
//! Four phases per bar, always in this order:
//! 1. Submit: file the orders accepted at the previous close, then file their
//!    brackets
//! 2. Trigger: promote conditional orders whose trigger the bar crosses
//! 3. Execute: execute pending orders the bar crosses, cancel OCO partners,
//!    merge fills into the running position for their side
//! 4. Accept: offer the plan's orders for this bar; queue those valid at the
//!    close for the next bar
//!
//! An order accepted at a close never sees the bar it was validated on.
//! Promotion runs before execution so an order triggered on a bar can execute
//! on that same bar.

use crate::domain::{Bar, Fill, Order, OrderId, OrderKind, Position, Side};
use crate::engine::order_manager::{OrderManager, OrderManagerError};
use crate::engine::state::{BarReport, Rejection, RunResult, TraderConfig};
use crate::plan::Plan;
use std::mem;
use tracing::{debug, warn};

/// Runs a plan against a bar series.
#[derive(Debug, Clone)]
pub struct Trader {
    plan: Plan,
    manager: OrderManager,
    config: TraderConfig,
    /// Accepted at the last close, filed at the start of the next bar.
    queued: Vec<Order>,
    long: Position,
    short: Position,
    fills: Vec<Fill>,
}

impl Trader {
    pub fn new(plan: Plan, config: TraderConfig) -> Self {
        let manager = OrderManager::with_id_gen(plan.id_gen().clone());
        Self {
            plan,
            manager,
            config,
            queued: Vec::new(),
            long: Position::empty(Side::Long),
            short: Position::empty(Side::Short),
            fills: Vec::new(),
        }
    }

    pub fn manager(&self) -> &OrderManager {
        &self.manager
    }

    pub fn config(&self) -> &TraderConfig {
        &self.config
    }

    /// Orders accepted at the last close and not yet filed.
    pub fn queued(&self) -> &[Order] {
        &self.queued
    }

    pub fn position(&self, side: Side) -> &Position {
        match side {
            Side::Long => &self.long,
            Side::Short => &self.short,
        }
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    /// Process one bar.
    pub fn step(&mut self, bar: &Bar) -> BarReport {
        let mut report = BarReport::new(bar.timestamp);

        // ─── Phase 1: Submit ───
        for order in mem::take(&mut self.queued) {
            self.submit(order, &mut report);
        }

        // ─── Phase 2: Trigger ───
        let triggering = self.config.trigger_mode.triggering(bar);
        report.promoted = self.manager.sweep_triggering(&*triggering);

        // ─── Phase 3: Execute ───
        let execution = self.config.execution_mode.execution(bar);
        let sweep = self.manager.sweep_execution(&*execution);
        report.cancelled = sweep.cancelled_ids();
        for order in &sweep.executed {
            let fill = Fill::from_order(order, bar.timestamp, fill_price(order, bar));
            self.apply_fill(&fill);
            report.executed.push(order.id());
            report.fills.push(fill);
        }
        self.fills.extend(report.fills.iter().cloned());

        // ─── Phase 4: Accept ───
        for order in self.plan.take(bar.timestamp) {
            self.accept(order, bar.close, &mut report);
        }

        report.long = self.long;
        report.short = self.short;
        report
    }

    /// Process every bar, then summarize.
    pub fn run(mut self, bars: &[Bar]) -> RunResult {
        let reports: Vec<BarReport> = bars.iter().map(|bar| self.step(bar)).collect();

        let never_offered = self.plan.len();
        if never_offered > 0 {
            warn!(
                count = never_offered,
                "scheduled orders had no matching bar and were never offered"
            );
        }
        if !self.queued.is_empty() {
            warn!(
                count = self.queued.len(),
                "orders accepted on the last bar were never filed"
            );
        }

        RunResult {
            bars: reports,
            fills: self.fills,
            long: self.long,
            short: self.short,
            open_orders: self
                .manager
                .pending()
                .chain(self.manager.conditional())
                .chain(self.queued.iter())
                .map(Order::id)
                .collect(),
        }
    }

    fn accept(&mut self, order: Order, close: f64, report: &mut BarReport) {
        let id = order.id();
        if !order.is_valid(close) {
            warn!(%id, close, "order not valid at close, rejected");
            report.rejected.push(Rejection {
                order_id: id,
                reason: format!("not valid at close {close}"),
            });
            return;
        }
        debug!(%id, close, "order accepted for the next bar");
        report.accepted.push(id);
        self.queued.push(order);
    }

    fn submit(&mut self, order: Order, report: &mut BarReport) {
        let id = order.id();
        let has_bracket = order.has_bracket();
        if let Err(e) = self.manager.file(order) {
            warn!(%id, error = %e, "order rejected");
            report.rejected.push(Rejection {
                order_id: id,
                reason: e.to_string(),
            });
            return;
        }
        report.submitted.push(id);

        if has_bracket {
            match self.file_bracket(id) {
                Ok(children) => report.submitted.extend(children),
                Err(e) => {
                    // The parent stays filed without protection.
                    warn!(parent = %id, error = %e, "bracket not filed");
                    report.rejected.push(Rejection {
                        order_id: id,
                        reason: format!("bracket: {e}"),
                    });
                }
            }
        }
    }

    fn file_bracket(&mut self, parent_id: OrderId) -> Result<Vec<OrderId>, OrderManagerError> {
        let bracket = self.manager.derive_bracket(parent_id)?;
        self.manager.file_bracket(bracket)
    }

    fn apply_fill(&mut self, fill: &Fill) {
        // Reducing a position is undefined here, so reduce-only fills are
        // reported but never allowed to grow one.
        if fill.reduce_only {
            debug!(order = %fill.order_id, "reduce-only fill not merged");
            return;
        }

        let position = match fill.side {
            Side::Long => &mut self.long,
            Side::Short => &mut self.short,
        };
        match position.merge(&Position::from_fill(fill)) {
            Ok(merged) => *position = merged,
            Err(e) => warn!(order = %fill.order_id, error = %e, "fill not merged"),
        }
    }
}

/// Run `plan` over `bars` with a fresh trader.
pub fn run_plan(bars: &[Bar], plan: Plan, config: TraderConfig) -> RunResult {
    Trader::new(plan, config).run(bars)
}

/// Market orders fill at the bar's close. Limit and stop orders fill at their
/// own price, moved into the bar's range when the bar gapped past it.
fn fill_price(order: &Order, bar: &Bar) -> f64 {
    match order.kind() {
        OrderKind::Market => bar.close,
        OrderKind::Limit | OrderKind::Stop => order.price().max(bar.low).min(bar.high),
    }
}
