//! Declarative agent strategy model, Agent Runner, Backtest Engine,
//! Marketplace, Performance Tracker and Data Pipeline (spec.md §4.9, §4.10;
//! SPEC_FULL.md §B).
//!
//! `AgentDefinition` (in `chainclaw-types`) is a serializable value; the
//! `evaluate` function it names cannot be serialized, so it lives in the
//! [`StrategyRegistry`] here, keyed by `(name, version)`, and is shared
//! unmodified between the live [`AgentRunner`] and the [`backtest`] replay
//! (spec.md §4.10: "using the same `strategy.evaluate` function as live").

pub mod backtest;
pub mod context;
pub mod data_pipeline;
pub mod marketplace;
pub mod performance;
pub mod registry;
pub mod runner;

pub use backtest::{run_backtest, BacktestConfig, BacktestResult};
pub use context::{EvaluateFn, EvaluationContext};
pub use data_pipeline::{extract_training_rows, label_due_outcomes};
pub use marketplace::Marketplace;
pub use performance::{compute_metrics, EquityPoint, TradeReturn};
pub use registry::{dip_buyer_definition, dip_buyer_evaluate, RegisteredStrategy, StrategyRegistry};
pub use runner::AgentRunner;
