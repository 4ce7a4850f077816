//! Position tracking and same-side aggregation.

use super::fill::Fill;
use super::ids::PositionId;
use super::order::{positive, Side, ValidationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PositionError {
    #[error("cannot merge a {0} position into a {1} position")]
    SideMismatch(Side, Side),
}

/// A single-side position: `size` units at an average entry `price` per unit.
///
/// `==` compares identity: every constructor and every merge hands out a new
/// [`PositionId`]. Copies share it. Value comparison is [`Position::equals_to`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Position {
    #[serde(skip)]
    id: PositionId,
    side: Side,
    size: f64,
    price: f64,
}

impl Position {
    pub fn empty(side: Side) -> Self {
        Self {
            id: PositionId::fresh(),
            side,
            size: 0.0,
            price: 0.0,
        }
    }

    /// A non-empty position needs a positive price; an empty one carries price 0.
    pub fn new(side: Side, size: f64, price: f64) -> Result<Self, ValidationError> {
        if !size.is_finite() {
            return Err(ValidationError::NonFinite { field: "size" });
        }
        if size < 0.0 {
            return Err(ValidationError::Negative {
                field: "size",
                value: size,
            });
        }
        if size == 0.0 {
            return Ok(Self::empty(side));
        }
        Ok(Self {
            id: PositionId::fresh(),
            side,
            size,
            price: positive("price", price)?,
        })
    }

    pub fn from_fill(fill: &Fill) -> Self {
        Self {
            id: PositionId::fresh(),
            side: fill.side,
            size: fill.size,
            price: fill.price,
        }
    }

    pub fn id(&self) -> PositionId {
        self.id
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

    pub fn is_empty(&self) -> bool {
        self.size == 0.0
    }

    /// Cost basis: size times average price.
    pub fn notional(&self) -> f64 {
        self.size * self.price
    }

    /// Combine two same-side positions at their size-weighted average price.
    pub fn merge(&self, other: &Position) -> Result<Position, PositionError> {
        if self.side != other.side {
            return Err(PositionError::SideMismatch(other.side, self.side));
        }
        let size = self.size + other.size;
        if size == 0.0 {
            return Ok(Position::empty(self.side));
        }
        Ok(Position {
            id: PositionId::fresh(),
            side: self.side,
            size,
            price: (self.notional() + other.notional()) / size,
        })
    }

    /// Value comparison on side, size and price.
    pub fn equals_to(&self, other: &Position) -> bool {
        self.side == other.side && self.size == other.size && self.price == other.price
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Position {}

/// Free-function form of [`Position::merge`].
pub fn merge(a: &Position, b: &Position) -> Result<Position, PositionError> {
    a.merge(b)
}
