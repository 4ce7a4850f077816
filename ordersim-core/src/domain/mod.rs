//! Domain types for ordersim

pub mod bar;
pub mod fill;
pub mod ids;
pub mod order;
pub mod position;

pub use bar::Bar;
pub use fill::Fill;
pub use ids::{IdGen, OrderId, PositionId};
pub use order::{Order, OrderKind, Side, ValidationError};
pub use position::{merge, Position, PositionError};
