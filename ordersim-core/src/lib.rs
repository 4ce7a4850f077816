//! ordersim core: order lifecycle simulation over a bar series.
//!
//! - Domain types (orders, positions, fills, bars, ids)
//! - Order manager with pending/conditional buckets and OCO links
//! - Triggering and execution protocols (intrabar range or close only)
//! - Bar-by-bar trader driving a submission plan through the manager
//! - TOML run configuration and CSV bar loading

pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod plan;
