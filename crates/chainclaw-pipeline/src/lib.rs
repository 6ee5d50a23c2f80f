//! Transaction Pipeline and Risk Engine (spec.md §4.7, §4.8): risk gate,
//! simulation, guardrails, confirmation, gas policy, broadcast and
//! confirmation-watch, plus the co-core risk scoring engine they both share.

pub mod error;
pub mod gas;
pub mod guardrails;
pub mod pipeline;
pub mod reconcile;
pub mod risk;

pub use error::{PipelineError, PipelineResult};
pub use gas::{compute_fees, GasFees, GasStrategy};
pub use guardrails::{GuardrailConfig, GuardrailOutcome};
pub use pipeline::{ConfirmationWatchConfig, TransactionPipeline, TxRequest, ROUND_TRIP_LOSS_WARNING_PCT};
pub use reconcile::reconcile_pending;
pub use risk::{BlockVerdict, RiskCategory, RiskEngine, SourceScanResult};
