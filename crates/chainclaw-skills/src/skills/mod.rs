//! The 13 built-in skills (spec.md §4.1).

pub mod agent;
pub mod alert;
pub mod backtest;
pub mod balance;
pub mod bridge;
mod chain_action;
pub mod dca;
pub mod history;
pub mod lend;
pub mod marketplace;
pub mod portfolio;
pub mod risk_check;
pub mod swap;
pub mod workflow;

pub use agent::AgentSkill;
pub use alert::AlertSkill;
pub use backtest::BacktestSkill;
pub use balance::BalanceSkill;
pub use bridge::BridgeSkill;
pub use dca::DcaSkill;
pub use history::HistorySkill;
pub use lend::LendSkill;
pub use marketplace::MarketplaceSkill;
pub use portfolio::PortfolioSkill;
pub use risk_check::RiskCheckSkill;
pub use swap::SwapSkill;
pub use workflow::WorkflowSkill;
