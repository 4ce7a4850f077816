//! Order lifecycle engine: the order manager, the crossing protocols it is
//! swept with, and the bar-driven trader on top.

pub mod order_manager;
pub mod protocol;
pub mod state;
pub mod trader;

pub use order_manager::{
    Bracket, Bucket, ExecutionSweep, OrderManager, OrderManagerError, Unfiled,
};
pub use protocol::{
    CloseExecution, CloseTrigger, CrossingMode, ExecutionProtocol, IntrabarExecution,
    IntrabarTrigger, TriggeringProtocol,
};
pub use state::{BarReport, Rejection, RunResult, TraderConfig};
pub use trader::{run_plan, Trader};
