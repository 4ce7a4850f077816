//! Order manager: pending/conditional buckets, OCO pairs, and sweeps.
//!
//! The manager is the single owner of three mappings keyed by order ID:
//! - pending orders (eligible for execution)
//! - conditional orders (waiting for their trigger)
//! - the OCO adjacency (symmetric, one partner per order)
//!
//! Invariants held after every public call:
//! - an ID is in at most one bucket
//! - `A ↦ B` in the adjacency iff `B ↦ A`, and both are filed
//! - removing an order cancels its OCO partner
//!
//! Sweeps are two-phase: the protocol is evaluated against an untouched bucket
//! first, then the collected transitions are applied in ascending ID order.
//! Buckets are `BTreeMap`s so that order is deterministic.

use crate::domain::{IdGen, Order, OrderId, ValidationError};
use crate::engine::protocol::{ExecutionProtocol, TriggeringProtocol};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Errors from order manager operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderManagerError {
    #[error("order {0} is already filed")]
    DuplicateOrder(OrderId),

    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    #[error("orders {0} and {1} are not OCO-linked")]
    OcoNotLinked(OrderId, OrderId),

    #[error("order {0} is already OCO-linked to {1}")]
    AlreadyLinked(OrderId, OrderId),

    #[error("order {0} cannot be OCO-linked to itself")]
    SelfLink(OrderId),

    #[error("order {id} belongs in the {expected} bucket, not {requested}")]
    BucketMismatch {
        id: OrderId,
        requested: Bucket,
        expected: Bucket,
    },

    #[error("invalid bracket order: {0}")]
    Validation(#[from] ValidationError),
}

/// Which manager bucket an order lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Pending,
    Conditional,
}

impl Bucket {
    fn for_order(order: &Order) -> Self {
        if order.is_conditional() {
            Bucket::Conditional
        } else {
            Bucket::Pending
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bucket::Pending => write!(f, "pending"),
            Bucket::Conditional => write!(f, "conditional"),
        }
    }
}

/// An order taken out of the manager, plus the OCO partner cancelled with it.
#[derive(Debug, Clone)]
pub struct Unfiled {
    pub order: Order,
    pub cancelled: Option<Order>,
}

/// Outcome of one execution sweep. Cancelled OCO partners are kept apart from
/// executions so callers can tell fills from cancellations.
#[derive(Debug, Clone, Default)]
pub struct ExecutionSweep {
    pub executed: Vec<Order>,
    pub cancelled: Vec<Order>,
}

impl ExecutionSweep {
    pub fn executed_ids(&self) -> Vec<OrderId> {
        self.executed.iter().map(Order::id).collect()
    }

    pub fn cancelled_ids(&self) -> Vec<OrderId> {
        self.cancelled.iter().map(Order::id).collect()
    }
}

/// Take-profit and stop-loss orders derived from a parent.
///
/// Both children are reduce-only limits with the parent's side and size. When
/// both exist, [`OrderManager::file_bracket`] links them as an OCO pair.
#[derive(Debug, Clone)]
pub struct Bracket {
    pub parent_id: OrderId,
    pub take_profit: Option<Order>,
    pub stop_loss: Option<Order>,
}

impl Bracket {
    pub fn is_empty(&self) -> bool {
        self.take_profit.is_none() && self.stop_loss.is_none()
    }

    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.take_profit.iter().chain(self.stop_loss.iter())
    }

    /// The pair that gets OCO-linked on filing, if both children exist.
    pub fn oco_pair(&self) -> Option<(OrderId, OrderId)> {
        match (&self.take_profit, &self.stop_loss) {
            (Some(tp), Some(sl)) => Some((tp.id(), sl.id())),
            _ => None,
        }
    }
}

/// The order manager: stores filed orders and applies their transitions.
#[derive(Debug, Clone, Default)]
pub struct OrderManager {
    pending: BTreeMap<OrderId, Order>,
    conditional: BTreeMap<OrderId, Order>,
    oco: HashMap<OrderId, OrderId>,
    /// Source of IDs for derived bracket orders.
    id_gen: IdGen,
}

impl OrderManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue an existing ID sequence, so bracket IDs never collide with
    /// orders created from the same generator.
    pub fn with_id_gen(id_gen: IdGen) -> Self {
        Self {
            id_gen,
            ..Self::default()
        }
    }

    /// Build a manager from a starting batch, each order filed by its
    /// conditional flag. Stops at the first order that cannot be filed.
    pub fn from_orders<I>(orders: I) -> Result<Self, OrderManagerError>
    where
        I: IntoIterator<Item = Order>,
    {
        let mut manager = Self::new();
        for order in orders {
            manager.file(order)?;
        }
        Ok(manager)
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub fn get(&self, id: OrderId) -> Option<&Order> {
        self.pending.get(&id).or_else(|| self.conditional.get(&id))
    }

    pub fn bucket_of(&self, id: OrderId) -> Option<Bucket> {
        if self.pending.contains_key(&id) {
            Some(Bucket::Pending)
        } else if self.conditional.contains_key(&id) {
            Some(Bucket::Conditional)
        } else {
            None
        }
    }

    pub fn contains(&self, id: OrderId) -> bool {
        self.bucket_of(id).is_some()
    }

    pub fn is_pending(&self, id: OrderId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn is_conditional(&self, id: OrderId) -> bool {
        self.conditional.contains_key(&id)
    }

    /// Pending orders in ascending ID order.
    pub fn pending(&self) -> impl Iterator<Item = &Order> {
        self.pending.values()
    }

    /// Conditional orders in ascending ID order.
    pub fn conditional(&self) -> impl Iterator<Item = &Order> {
        self.conditional.values()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn conditional_count(&self) -> usize {
        self.conditional.len()
    }

    pub fn len(&self) -> usize {
        self.pending.len() + self.conditional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.conditional.is_empty()
    }

    pub fn oco_partner(&self, id: OrderId) -> Option<OrderId> {
        self.oco.get(&id).copied()
    }

    /// Number of linked OCO pairs.
    pub fn oco_pair_count(&self) -> usize {
        self.oco.len() / 2
    }

    // ── Filing ─────────────────────────────────────────────────────────

    /// File an order into pending or conditional, depending on whether it
    /// carries a trigger.
    pub fn file(&mut self, order: Order) -> Result<Bucket, OrderManagerError> {
        let bucket = Bucket::for_order(&order);
        self.insert(bucket, order)?;
        Ok(bucket)
    }

    /// File into pending only. Conditional orders are refused.
    pub fn file_pending(&mut self, order: Order) -> Result<(), OrderManagerError> {
        self.insert_checked(Bucket::Pending, order)
    }

    /// File into conditional only. Orders without a trigger are refused.
    pub fn file_conditional(&mut self, order: Order) -> Result<(), OrderManagerError> {
        self.insert_checked(Bucket::Conditional, order)
    }

    pub fn unfile_pending(&mut self, id: OrderId) -> Result<Unfiled, OrderManagerError> {
        let order = self
            .pending
            .remove(&id)
            .ok_or(OrderManagerError::OrderNotFound(id))?;
        Ok(self.finish_removal(order))
    }

    pub fn unfile_conditional(&mut self, id: OrderId) -> Result<Unfiled, OrderManagerError> {
        let order = self
            .conditional
            .remove(&id)
            .ok_or(OrderManagerError::OrderNotFound(id))?;
        Ok(self.finish_removal(order))
    }

    /// Remove an order from whichever bucket holds it.
    pub fn remove(&mut self, id: OrderId) -> Result<Unfiled, OrderManagerError> {
        match self.bucket_of(id) {
            Some(Bucket::Pending) => self.unfile_pending(id),
            Some(Bucket::Conditional) => self.unfile_conditional(id),
            None => Err(OrderManagerError::OrderNotFound(id)),
        }
    }

    // ── OCO ────────────────────────────────────────────────────────────

    pub fn link_oco(&mut self, a: OrderId, b: OrderId) -> Result<(), OrderManagerError> {
        for id in [a, b] {
            if !self.contains(id) {
                return Err(OrderManagerError::OrderNotFound(id));
            }
        }
        if a == b {
            return Err(OrderManagerError::SelfLink(a));
        }
        for id in [a, b] {
            if let Some(partner) = self.oco_partner(id) {
                return Err(OrderManagerError::AlreadyLinked(id, partner));
            }
        }
        self.oco.insert(a, b);
        self.oco.insert(b, a);
        debug!(%a, %b, "OCO linked");
        Ok(())
    }

    pub fn unlink_oco(&mut self, a: OrderId, b: OrderId) -> Result<(), OrderManagerError> {
        if self.oco_partner(a) != Some(b) || self.oco_partner(b) != Some(a) {
            return Err(OrderManagerError::OcoNotLinked(a, b));
        }
        self.oco.remove(&a);
        self.oco.remove(&b);
        debug!(%a, %b, "OCO unlinked");
        Ok(())
    }

    // ── Brackets ───────────────────────────────────────────────────────

    /// Derive the take-profit/stop-loss orders of a filed parent.
    ///
    /// Nothing is filed; hand the result to [`OrderManager::file_bracket`].
    pub fn derive_bracket(&mut self, parent_id: OrderId) -> Result<Bracket, OrderManagerError> {
        let parent = self
            .get(parent_id)
            .ok_or(OrderManagerError::OrderNotFound(parent_id))?;
        let (side, size) = (parent.side(), parent.size());
        let (tp_price, sl_price) = (parent.take_profit(), parent.stop_loss());

        let take_profit = match tp_price {
            Some(price) => {
                let id = self.id_gen.next_order_id();
                Some(Order::limit(id, side, size, price)?.with_reduce_only(true))
            }
            None => None,
        };
        let stop_loss = match sl_price {
            Some(price) => {
                let id = self.id_gen.next_order_id();
                Some(Order::limit(id, side, size, price)?.with_reduce_only(true))
            }
            None => None,
        };

        Ok(Bracket {
            parent_id,
            take_profit,
            stop_loss,
        })
    }

    /// File a derived bracket and OCO-link its children. All or nothing: if
    /// any step fails, nothing from the bracket stays filed.
    pub fn file_bracket(&mut self, bracket: Bracket) -> Result<Vec<OrderId>, OrderManagerError> {
        let pair = bracket.oco_pair();
        let mut filed = Vec::new();

        for order in bracket.take_profit.into_iter().chain(bracket.stop_loss) {
            let id = order.id();
            if let Err(e) = self.file(order) {
                self.rollback(&filed);
                return Err(e);
            }
            filed.push(id);
        }

        if let Some((tp, sl)) = pair {
            if let Err(e) = self.link_oco(tp, sl) {
                self.rollback(&filed);
                return Err(e);
            }
        }

        debug!(parent = %bracket.parent_id, children = ?filed, "bracket filed");
        Ok(filed)
    }

    // ── Sweeps ─────────────────────────────────────────────────────────

    /// Promote every conditional order the protocol reports as triggered.
    ///
    /// Returns the promoted IDs in ascending order.
    pub fn sweep_triggering<P>(&mut self, protocol: &P) -> Vec<OrderId>
    where
        P: TriggeringProtocol + ?Sized,
    {
        let triggered: Vec<OrderId> = self
            .conditional
            .values()
            .filter(|order| protocol.check_triggering(order))
            .map(Order::id)
            .collect();

        for &id in &triggered {
            if let Some(order) = self.conditional.remove(&id) {
                debug!(%id, "conditional order triggered");
                self.pending.insert(id, order);
            }
        }
        triggered
    }

    /// Remove every pending order the protocol reports as executed, cancelling
    /// OCO partners along the way.
    ///
    /// When both halves of an OCO pair pass in the same sweep, the lower ID
    /// executes and the other is cancelled.
    pub fn sweep_execution<P>(&mut self, protocol: &P) -> ExecutionSweep
    where
        P: ExecutionProtocol + ?Sized,
    {
        let executable: Vec<OrderId> = self
            .pending
            .values()
            .filter(|order| protocol.check_execution(order))
            .map(Order::id)
            .collect();

        let mut sweep = ExecutionSweep::default();
        for id in executable {
            // Already cancelled as the partner of an earlier execution.
            let Some(order) = self.pending.remove(&id) else {
                continue;
            };
            debug!(%id, "order executed");
            if let Some(partner) = self.cancel_partner(id) {
                sweep.cancelled.push(partner);
            }
            sweep.executed.push(order);
        }
        sweep
    }

    // ── Internal helpers ───────────────────────────────────────────────

    fn insert(&mut self, bucket: Bucket, order: Order) -> Result<(), OrderManagerError> {
        let id = order.id();
        if self.contains(id) {
            return Err(OrderManagerError::DuplicateOrder(id));
        }
        self.id_gen.observe(id);
        debug!(%id, %bucket, "order filed");
        match bucket {
            Bucket::Pending => self.pending.insert(id, order),
            Bucket::Conditional => self.conditional.insert(id, order),
        };
        Ok(())
    }

    fn insert_checked(&mut self, bucket: Bucket, order: Order) -> Result<(), OrderManagerError> {
        let expected = Bucket::for_order(&order);
        if expected != bucket {
            return Err(OrderManagerError::BucketMismatch {
                id: order.id(),
                requested: bucket,
                expected,
            });
        }
        self.insert(bucket, order)
    }

    /// Drop a just-removed order's OCO link and cancel its partner.
    fn finish_removal(&mut self, order: Order) -> Unfiled {
        let cancelled = self.cancel_partner(order.id());
        Unfiled { order, cancelled }
    }

    /// Clear the adjacency on both sides and take the partner out of its bucket.
    fn cancel_partner(&mut self, id: OrderId) -> Option<Order> {
        let partner_id = self.oco.remove(&id)?;
        self.oco.remove(&partner_id);
        let partner = self
            .pending
            .remove(&partner_id)
            .or_else(|| self.conditional.remove(&partner_id));
        if partner.is_some() {
            debug!(%id, partner = %partner_id, "OCO partner cancelled");
        }
        partner
    }

    /// Undo a partially filed bracket.
    fn rollback(&mut self, filed: &[OrderId]) {
        for &id in filed {
            if let Some(partner) = self.oco.remove(&id) {
                self.oco.remove(&partner);
            }
            self.pending.remove(&id);
            self.conditional.remove(&id);
        }
    }
}
