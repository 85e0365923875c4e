//! Trading strategy implementation.
//!
//! Contains the core logic for:
//! - Entry gating on spread and top-of-book depth
//! - The open → settle → close position cycle
//! - The orchestrating loop with failover and shutdown cleanup

mod market_gate;
mod orchestrator;
mod position_cycle;

pub use market_gate::{GateDecision, MarketGate, RejectReason};
pub use orchestrator::{
    until_next_midnight, CycleOrchestrator, CycleOutcome, CycleStats, SharedClient, SkipReason,
};
pub use position_cycle::{
    compute_order_size, CloseReport, CloseTrigger, CycleError, OpenReport, PositionCycle,
};
