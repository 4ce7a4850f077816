//! Orders: side, kind, validated price fields, and the validity/trigger predicates.
//!
//! Limit and Stop are exact mirrors. A Stop accepts a reference price exactly
//! when a Limit with the same side and target rejects it, so the two can never
//! drift apart. Touching the target counts for a Limit (it buys no higher than,
//! sells no lower than, its target) and therefore not for a Stop.

use super::ids::OrderId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

/// Errors raised when an order or position is built or mutated with bad data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("`{field}` must be greater than 0 (got {value})")]
    NonPositive { field: &'static str, value: f64 },

    #[error("`{field}` must not be negative (got {value})")]
    Negative { field: &'static str, value: f64 },

    #[error("`{field}` must be a finite number")]
    NonFinite { field: &'static str },

    #[error("`side` must be long or short (got {0:?})")]
    InvalidSide(String),
}

/// Direction of an order or position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

impl FromStr for Side {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "long" | "buy" | "buy/long" => Ok(Side::Long),
            "short" | "sell" | "sell/short" => Ok(Side::Short),
            _ => Err(ValidationError::InvalidSide(s.to_string())),
        }
    }
}

/// Order variant. The variants differ only in their predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    Market,
    Limit,
    Stop,
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKind::Market => write!(f, "market"),
            OrderKind::Limit => write!(f, "limit"),
            OrderKind::Stop => write!(f, "stop"),
        }
    }
}

/// A single order.
///
/// Fields are private: every mutation goes through a setter that re-runs the
/// construction checks, so an `Order` value is always valid. Equality (`==`)
/// is identity by ID; use [`Order::equals_to`] to compare field values.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    id: OrderId,
    kind: OrderKind,
    side: Side,
    size: f64,
    price: f64,
    take_profit: Option<f64>,
    stop_loss: Option<f64>,
    trigger_price: Option<f64>,
    reduce_only: bool,
    is_conditional: bool,
}

impl Order {
    pub fn new(
        id: OrderId,
        kind: OrderKind,
        side: Side,
        size: f64,
        price: f64,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            id,
            kind,
            side,
            size: positive("size", size)?,
            price: positive("price", price)?,
            take_profit: None,
            stop_loss: None,
            trigger_price: None,
            reduce_only: false,
            is_conditional: false,
        })
    }

    /// Market order. `price` is the reference price the order was planned at.
    pub fn market(id: OrderId, side: Side, size: f64, price: f64) -> Result<Self, ValidationError> {
        Self::new(id, OrderKind::Market, side, size, price)
    }

    pub fn limit(id: OrderId, side: Side, size: f64, price: f64) -> Result<Self, ValidationError> {
        Self::new(id, OrderKind::Limit, side, size, price)
    }

    pub fn stop(id: OrderId, side: Side, size: f64, price: f64) -> Result<Self, ValidationError> {
        Self::new(id, OrderKind::Stop, side, size, price)
    }

    pub fn with_take_profit(mut self, price: f64) -> Result<Self, ValidationError> {
        self.set_take_profit(Some(price))?;
        Ok(self)
    }

    pub fn with_stop_loss(mut self, price: f64) -> Result<Self, ValidationError> {
        self.set_stop_loss(Some(price))?;
        Ok(self)
    }

    pub fn with_trigger_price(mut self, price: f64) -> Result<Self, ValidationError> {
        self.set_trigger_price(Some(price))?;
        Ok(self)
    }

    pub fn with_reduce_only(mut self, reduce_only: bool) -> Self {
        self.reduce_only = reduce_only;
        self
    }

    // ── Accessors ──────────────────────────────────────────────────────

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn kind(&self) -> OrderKind {
        self.kind
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn size(&self) -> f64 {
        self.size
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn take_profit(&self) -> Option<f64> {
        self.take_profit
    }

    pub fn stop_loss(&self) -> Option<f64> {
        self.stop_loss
    }

    pub fn trigger_price(&self) -> Option<f64> {
        self.trigger_price
    }

    pub fn reduce_only(&self) -> bool {
        self.reduce_only
    }

    /// True once a trigger price has ever been set. Clearing the trigger
    /// price afterwards does not reset it.
    pub fn is_conditional(&self) -> bool {
        self.is_conditional
    }

    /// Whether the order carries a take-profit or stop-loss to derive.
    pub fn has_bracket(&self) -> bool {
        self.take_profit.is_some() || self.stop_loss.is_some()
    }

    /// Price the trigger predicate compares against: the trigger price when
    /// set, the order price otherwise.
    pub fn trigger_level(&self) -> f64 {
        self.trigger_price.unwrap_or(self.price)
    }

    // ── Validating setters ─────────────────────────────────────────────

    pub fn set_side(&mut self, side: Side) {
        self.side = side;
    }

    pub fn set_size(&mut self, size: f64) -> Result<(), ValidationError> {
        self.size = positive("size", size)?;
        Ok(())
    }

    pub fn set_price(&mut self, price: f64) -> Result<(), ValidationError> {
        self.price = positive("price", price)?;
        Ok(())
    }

    pub fn set_take_profit(&mut self, price: Option<f64>) -> Result<(), ValidationError> {
        self.take_profit = positive_opt("take_profit", price)?;
        Ok(())
    }

    pub fn set_stop_loss(&mut self, price: Option<f64>) -> Result<(), ValidationError> {
        self.stop_loss = positive_opt("stop_loss", price)?;
        Ok(())
    }

    pub fn set_trigger_price(&mut self, price: Option<f64>) -> Result<(), ValidationError> {
        self.trigger_price = positive_opt("trigger_price", price)?;
        if self.trigger_price.is_some() {
            self.is_conditional = true;
        }
        Ok(())
    }

    pub fn set_reduce_only(&mut self, reduce_only: bool) {
        self.reduce_only = reduce_only;
    }

    // ── Predicates ─────────────────────────────────────────────────────

    /// Whether the order may be filed when the market is at `reference`.
    ///
    /// Market: always. Long limit: reference <= price. Short limit:
    /// reference >= price. Stop: the complement of the limit rule.
    pub fn is_valid(&self, reference: f64) -> bool {
        self.accepts(self.price, reference)
    }

    /// Whether a bar with this high/low range crosses the order's trigger level.
    pub fn is_triggered(&self, high: f64, low: f64) -> bool {
        self.accepts(self.trigger_level(), self.probe(high, low))
    }

    /// Whether a bar with this high/low range crosses the order's own price.
    pub fn is_crossed(&self, high: f64, low: f64) -> bool {
        self.accepts(self.price, self.probe(high, low))
    }

    /// Field-wise comparison, ignoring the ID.
    pub fn equals_to(&self, other: &Order) -> bool {
        self.kind == other.kind
            && self.side == other.side
            && self.size == other.size
            && self.price == other.price
            && self.take_profit == other.take_profit
            && self.stop_loss == other.stop_loss
            && self.trigger_price == other.trigger_price
            && self.reduce_only == other.reduce_only
            && self.is_conditional == other.is_conditional
    }

    fn accepts(&self, target: f64, reference: f64) -> bool {
        match self.kind {
            OrderKind::Market => true,
            OrderKind::Limit => limit_accepts(self.side, target, reference),
            OrderKind::Stop => !limit_accepts(self.side, target, reference),
        }
    }

    /// The bar extreme a crossing check looks at: the favorable extreme for a
    /// limit, the adverse one for a stop.
    fn probe(&self, high: f64, low: f64) -> f64 {
        match (self.kind, self.side) {
            (OrderKind::Limit, Side::Long) | (OrderKind::Stop, Side::Short) => low,
            (OrderKind::Limit, Side::Short) | (OrderKind::Stop, Side::Long) => high,
            (OrderKind::Market, _) => low,
        }
    }
}

fn limit_accepts(side: Side, target: f64, reference: f64) -> bool {
    match side {
        Side::Long => reference <= target,
        Side::Short => reference >= target,
    }
}

impl PartialEq for Order {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Order {}

impl Hash for Order {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} @ {}",
            self.id, self.kind, self.side, self.size, self.price
        )?;
        if let Some(trigger) = self.trigger_price {
            write!(f, " trigger {trigger}")?;
        }
        if self.reduce_only {
            write!(f, " reduce-only")?;
        }
        Ok(())
    }
}

pub(crate) fn positive(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFinite { field });
    }
    if value <= 0.0 {
        return Err(ValidationError::NonPositive { field, value });
    }
    Ok(value)
}

fn positive_opt(field: &'static str, value: Option<f64>) -> Result<Option<f64>, ValidationError> {
    value.map(|v| positive(field, v)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit(side: Side, price: f64) -> Order {
        Order::limit(OrderId(1), side, 10.0, price).unwrap()
    }

    fn stop(side: Side, price: f64) -> Order {
        Order::stop(OrderId(2), side, 10.0, price).unwrap()
    }

    // ── Construction ───────────────────────────────────────────────────

    #[test]
    fn rejects_non_positive_size() {
        let err = Order::market(OrderId(1), Side::Long, 0.0, 100.0).unwrap_err();
        assert_eq!(
            err,
            ValidationError::NonPositive {
                field: "size",
                value: 0.0
            }
        );
    }

    #[test]
    fn rejects_non_positive_price() {
        let err = Order::limit(OrderId(1), Side::Short, 1.0, -5.0).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::NonPositive { field: "price", .. }
        ));
    }

    #[test]
    fn rejects_nan_price() {
        let err = Order::stop(OrderId(1), Side::Short, 1.0, f64::NAN).unwrap_err();
        assert_eq!(err, ValidationError::NonFinite { field: "price" });
    }

    #[test]
    fn rejects_bad_bracket_prices() {
        let order = limit(Side::Long, 100.0);
        let err = order.clone().with_take_profit(0.0).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::NonPositive {
                field: "take_profit",
                ..
            }
        ));
        let err = order.with_stop_loss(-1.0).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::NonPositive {
                field: "stop_loss",
                ..
            }
        ));
    }

    #[test]
    fn failed_setter_leaves_order_untouched() {
        let mut order = limit(Side::Long, 100.0);
        assert!(order.set_size(-3.0).is_err());
        assert!(order.set_trigger_price(Some(0.0)).is_err());
        assert_eq!(order.size(), 10.0);
        assert_eq!(order.trigger_price(), None);
        assert!(!order.is_conditional());
    }

    #[test]
    fn side_parses_legacy_spellings() {
        assert_eq!("Buy/Long".parse::<Side>().unwrap(), Side::Long);
        assert_eq!("SELL/SHORT".parse::<Side>().unwrap(), Side::Short);
        assert_eq!(" short ".parse::<Side>().unwrap(), Side::Short);
        assert_eq!(
            "flat".parse::<Side>().unwrap_err(),
            ValidationError::InvalidSide("flat".into())
        );
    }

    // ── Conditional flag ───────────────────────────────────────────────

    #[test]
    fn trigger_price_makes_order_conditional_for_good() {
        let mut order = limit(Side::Long, 100.0);
        assert!(!order.is_conditional());

        order.set_trigger_price(Some(98.0)).unwrap();
        assert!(order.is_conditional());
        assert_eq!(order.trigger_level(), 98.0);

        order.set_trigger_price(None).unwrap();
        assert!(order.is_conditional());
        assert_eq!(order.trigger_level(), 100.0);
    }

    // ── is_valid ───────────────────────────────────────────────────────

    #[test]
    fn market_is_always_valid() {
        let order = Order::market(OrderId(1), Side::Short, 1.0, 50.0).unwrap();
        assert!(order.is_valid(1.0));
        assert!(order.is_valid(1_000.0));
        assert!(order.is_triggered(60.0, 40.0));
    }

    #[test]
    fn long_limit_valid_at_or_below_target() {
        let order = limit(Side::Long, 100.0);
        assert!(order.is_valid(99.0));
        assert!(order.is_valid(100.0));
        assert!(!order.is_valid(101.0));
    }

    #[test]
    fn short_limit_valid_at_or_above_target() {
        let order = limit(Side::Short, 100.0);
        assert!(order.is_valid(101.0));
        assert!(order.is_valid(100.0));
        assert!(!order.is_valid(99.0));
    }

    #[test]
    fn long_stop_valid_strictly_above_target() {
        let order = stop(Side::Long, 100.0);
        assert!(order.is_valid(101.0));
        assert!(!order.is_valid(100.0));
        assert!(!order.is_valid(99.0));
    }

    #[test]
    fn short_stop_valid_strictly_below_target() {
        let order = stop(Side::Short, 100.0);
        assert!(order.is_valid(99.0));
        assert!(!order.is_valid(100.0));
        assert!(!order.is_valid(101.0));
    }

    #[test]
    fn limit_and_stop_are_complements_at_the_target() {
        for side in [Side::Long, Side::Short] {
            let l = limit(side, 100.0);
            let s = stop(side, 100.0);
            for p in [99.99, 100.0, 100.01] {
                assert_eq!(l.is_valid(p), !s.is_valid(p), "side {side} at {p}");
            }
        }
    }

    // ── is_triggered / is_crossed ──────────────────────────────────────

    #[test]
    fn long_limit_triggers_on_low() {
        let order = limit(Side::Long, 100.0);
        assert!(order.is_triggered(110.0, 100.0));
        assert!(!order.is_triggered(110.0, 100.5));
    }

    #[test]
    fn short_limit_triggers_on_high() {
        let order = limit(Side::Short, 100.0);
        assert!(order.is_triggered(100.0, 90.0));
        assert!(!order.is_triggered(99.5, 90.0));
    }

    #[test]
    fn long_stop_triggers_when_high_passes_target() {
        let order = stop(Side::Long, 100.0);
        assert!(order.is_triggered(100.5, 95.0));
        assert!(!order.is_triggered(100.0, 95.0));
    }

    #[test]
    fn short_stop_triggers_when_low_passes_target() {
        let order = stop(Side::Short, 100.0);
        assert!(order.is_triggered(105.0, 99.5));
        assert!(!order.is_triggered(105.0, 100.0));
    }

    #[test]
    fn flat_bar_trigger_matches_is_valid() {
        for side in [Side::Long, Side::Short] {
            for order in [limit(side, 100.0), stop(side, 100.0)] {
                for p in [99.0, 100.0, 101.0] {
                    assert_eq!(order.is_triggered(p, p), order.is_valid(p));
                }
            }
        }
    }

    #[test]
    fn trigger_uses_trigger_price_but_crossing_uses_price() {
        let order = limit(Side::Long, 100.0).with_trigger_price(95.0).unwrap();
        // Low of 97 reaches the price but not the trigger.
        assert!(!order.is_triggered(105.0, 97.0));
        assert!(order.is_crossed(105.0, 97.0));
        assert!(order.is_triggered(105.0, 94.0));
    }

    // ── Equality ───────────────────────────────────────────────────────

    #[test]
    fn equality_is_identity() {
        let a = Order::limit(OrderId(1), Side::Long, 10.0, 100.0).unwrap();
        let b = Order::limit(OrderId(2), Side::Long, 10.0, 100.0).unwrap();
        let a_moved = Order::stop(OrderId(1), Side::Short, 3.0, 50.0).unwrap();

        assert_ne!(a, b);
        assert!(a.equals_to(&b));

        assert_eq!(a, a_moved);
        assert!(!a.equals_to(&a_moved));
    }

    #[test]
    fn equals_to_sees_reduce_only_and_kind() {
        let a = Order::limit(OrderId(1), Side::Long, 10.0, 100.0).unwrap();
        let b = a.clone().with_reduce_only(true);
        let c = Order::stop(OrderId(3), Side::Long, 10.0, 100.0).unwrap();
        assert!(!a.equals_to(&b));
        assert!(!a.equals_to(&c));
    }

    #[test]
    fn display_is_compact() {
        let order = limit(Side::Long, 100.0)
            .with_trigger_price(95.0)
            .unwrap()
            .with_reduce_only(true);
        assert_eq!(
            order.to_string(),
            "#1 limit long 10 @ 100 trigger 95 reduce-only"
        );
    }
}
