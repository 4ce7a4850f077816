use crate::domain::ids::OrderId;
use crate::domain::order::{Order, Side};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Fill record: one executed order, always full size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: OrderId,
    pub timestamp: NaiveDateTime,
    pub side: Side,
    pub size: f64,
    pub price: f64,
    pub reduce_only: bool,
}

impl Fill {
    pub fn from_order(order: &Order, timestamp: NaiveDateTime, price: f64) -> Self {
        Self {
            order_id: order.id(),
            timestamp,
            side: order.side(),
            size: order.size(),
            price,
            reduce_only: order.reduce_only(),
        }
    }
}
