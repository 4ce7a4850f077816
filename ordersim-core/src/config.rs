//! Run configuration: trader settings plus the scheduled orders, from TOML.

use crate::data::parse_timestamp;
use crate::domain::{Order, OrderId, OrderKind, Side, ValidationError};
use crate::engine::TraderConfig;
use crate::plan::Plan;
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Content hash identifying a run configuration.
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("order {index}: {source}")]
    InvalidOrder {
        index: usize,
        #[source]
        source: ValidationError,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Everything needed to reproduce a run, bars aside.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub trader: TraderConfig,
    #[serde(default)]
    pub orders: Vec<OrderConfig>,
}

/// One scheduled order as written in the plan file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderConfig {
    /// Bar timestamp at which the order is offered.
    #[serde(deserialize_with = "timestamp_from_str")]
    pub at: NaiveDateTime,
    pub kind: OrderKind,
    #[serde(deserialize_with = "side_from_str")]
    pub side: Side,
    pub size: f64,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_price: Option<f64>,
    #[serde(default)]
    pub reduce_only: bool,
}

impl OrderConfig {
    pub fn to_order(&self, id: OrderId) -> Result<Order, ValidationError> {
        let mut order = Order::new(id, self.kind, self.side, self.size, self.price)?
            .with_reduce_only(self.reduce_only);
        order.set_take_profit(self.take_profit)?;
        order.set_stop_loss(self.stop_loss)?;
        order.set_trigger_price(self.trigger_price)?;
        Ok(order)
    }
}

impl RunConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Validate every order and schedule it. IDs are assigned in file order
    /// starting at 1.
    pub fn build_plan(&self) -> Result<Plan, ConfigError> {
        let mut plan = Plan::new();
        for (index, entry) in self.orders.iter().enumerate() {
            let id = plan.next_id();
            let order = entry
                .to_order(id)
                .map_err(|source| ConfigError::InvalidOrder { index, source })?;
            plan.schedule(entry.at, order);
        }
        Ok(plan)
    }

    /// BLAKE3 over the JSON form. Identical configs share a run id.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

fn side_from_str<'de, D>(deserializer: D) -> Result<Side, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

fn timestamp_from_str<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_timestamp(&s)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognized timestamp {s:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CrossingMode;

    const PLAN: &str = r#"
[trader]
execution_mode = "close"

[[orders]]
at = "2024-01-02"
kind = "limit"
side = "Buy"
size = 10.0
price = 102.0
take_profit = 120.0
stop_loss = 90.0

[[orders]]
at = "2024-01-03T00:00:00"
kind = "stop"
side = "sell/short"
size = 5.0
price = 95.0
trigger_price = 97.0
"#;

    #[test]
    fn parses_plan_file() {
        let config = RunConfig::from_toml_str(PLAN).unwrap();
        assert_eq!(config.trader.trigger_mode, CrossingMode::Intrabar);
        assert_eq!(config.trader.execution_mode, CrossingMode::Close);
        assert_eq!(config.orders.len(), 2);
        assert_eq!(config.orders[0].side, Side::Long);
        assert_eq!(config.orders[1].side, Side::Short);
        assert!(!config.orders[0].reduce_only);
    }

    #[test]
    fn build_plan_assigns_ids_in_file_order() {
        let plan = RunConfig::from_toml_str(PLAN).unwrap().build_plan().unwrap();
        assert_eq!(plan.len(), 2);

        let first = &plan.get(parse_timestamp("2024-01-02").unwrap())[0];
        assert_eq!(first.id(), OrderId(1));
        assert_eq!(first.take_profit(), Some(120.0));
        assert!(!first.is_conditional());

        let second = &plan.get(parse_timestamp("2024-01-03").unwrap())[0];
        assert_eq!(second.id(), OrderId(2));
        assert!(second.is_conditional());
        assert_eq!(second.trigger_level(), 97.0);
    }

    #[test]
    fn invalid_order_reports_index() {
        let toml = r#"
[[orders]]
at = "2024-01-02"
kind = "market"
side = "long"
size = 1.0
price = 100.0

[[orders]]
at = "2024-01-02"
kind = "market"
side = "long"
size = -1.0
price = 100.0
"#;
        let err = RunConfig::from_toml_str(toml).unwrap().build_plan().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOrder { index: 1, .. }));
    }

    #[test]
    fn unknown_side_is_a_parse_error() {
        let toml = r#"
[[orders]]
at = "2024-01-02"
kind = "market"
side = "sideways"
size = 1.0
price = 100.0
"#;
        assert!(matches!(
            RunConfig::from_toml_str(toml),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn run_id_is_deterministic_and_content_sensitive() {
        let a = RunConfig::from_toml_str(PLAN).unwrap();
        let mut b = a.clone();
        assert_eq!(a.run_id().unwrap(), b.run_id().unwrap());

        b.orders[0].size = 11.0;
        assert_ne!(a.run_id().unwrap(), b.run_id().unwrap());
    }

    #[test]
    fn empty_file_is_an_empty_run() {
        let config = RunConfig::from_toml_str("").unwrap();
        assert!(config.orders.is_empty());
        assert!(config.build_plan().unwrap().is_empty());
    }
}
