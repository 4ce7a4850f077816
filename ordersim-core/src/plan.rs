//! Submission plan: which orders to try filing at which bar.

use crate::domain::{IdGen, Order, OrderId};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;

/// Orders keyed by the bar timestamp they should be offered at.
///
/// The plan owns the ID generator its orders were built from, so anything the
/// trader derives later (bracket children) continues the same sequence.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    entries: BTreeMap<NaiveDateTime, Vec<Order>>,
    id_gen: IdGen,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next ID for an order built for this plan.
    pub fn next_id(&mut self) -> OrderId {
        self.id_gen.next_order_id()
    }

    /// Add an order at `at`, after any already scheduled there.
    pub fn schedule(&mut self, at: NaiveDateTime, order: Order) {
        self.id_gen.observe(order.id());
        self.entries.entry(at).or_default().push(order);
    }

    /// Remove and return the orders scheduled at `at`, in scheduling order.
    pub fn take(&mut self, at: NaiveDateTime) -> Vec<Order> {
        self.entries.remove(&at).unwrap_or_default()
    }

    pub fn get(&self, at: NaiveDateTime) -> &[Order] {
        self.entries.get(&at).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn timestamps(&self) -> impl Iterator<Item = &NaiveDateTime> {
        self.entries.keys()
    }

    /// Total number of scheduled orders.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn id_gen(&self) -> &IdGen {
        &self.id_gen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;
    use chrono::NaiveDate;

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn schedule_and_take_preserve_order() {
        let mut plan = Plan::new();
        let a = Order::market(plan.next_id(), Side::Long, 1.0, 10.0).unwrap();
        let b = Order::market(plan.next_id(), Side::Short, 1.0, 10.0).unwrap();
        plan.schedule(ts(2), a);
        plan.schedule(ts(2), b);
        assert_eq!(plan.len(), 2);

        let taken = plan.take(ts(2));
        assert_eq!(
            taken.iter().map(Order::id).collect::<Vec<_>>(),
            vec![OrderId(1), OrderId(2)]
        );
        assert!(plan.is_empty());
        assert!(plan.take(ts(2)).is_empty());
    }

    #[test]
    fn external_ids_advance_the_generator() {
        let mut plan = Plan::new();
        plan.schedule(ts(3), Order::market(OrderId(10), Side::Long, 1.0, 10.0).unwrap());
        assert_eq!(plan.next_id(), OrderId(11));
        assert_eq!(plan.get(ts(3)).len(), 1);
        assert!(plan.get(ts(4)).is_empty());
    }
}
