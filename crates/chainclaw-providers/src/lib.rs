//! Outbound HTTP boundaries (spec.md §6): the LLM chat abstraction used by
//! the Intent Parser, the price oracle, and narrow typed traits for every
//! other external API the Transaction Pipeline and Risk Engine touch.
//!
//! Concrete chain RPC and security/pricing clients are external
//! collaborators (spec.md §1); this crate owns only the interfaces plus the
//! uniform LLM chat adapters and the price oracle, which are in scope.

pub mod boundaries;
pub mod embedding;
pub mod llm;
pub mod price;

pub use boundaries::*;
pub use embedding::{EmbeddingProvider, OpenAiStyleEmbeddingProvider};
pub use llm::{ChatMessage, ChatResponse, LlmProvider, ToolCall, ToolSchema};
pub use price::PriceOracle;
