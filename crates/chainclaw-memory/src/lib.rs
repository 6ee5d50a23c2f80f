//! The persistent store (spec.md §2 "Persistent Store", §5, §6) — the only
//! durability boundary — plus the Conversation/Preferences/Vector Memory
//! subsystem, the Transaction Log, and every other per-table module named
//! in spec.md §6's persistence layout. Deliberately merged into one crate
//! per `SPEC_FULL.md` §C: all of it shares one `rusqlite` WAL connection.
//!
//! Grounded on the teacher's `tandem-memory::db` connection-management
//! pattern (open, WAL, busy-timeout, schema init) with the schema fully
//! replaced by spec.md §6's table set.

pub mod alerts;
pub mod conversation;
pub mod cron_jobs;
pub mod dca_jobs;
pub mod delivery_queue;
pub mod error;
pub mod historical_prices;
pub mod marketplace;
pub mod preferences;
pub mod retention;
pub mod risk_cache;
pub mod risk_lists;
pub mod store;
pub mod strategy_records;
pub mod tx_log;
pub mod vector_memory;

pub use delivery_queue::QueuedDelivery;
pub use error::{StoreError, StoreResult};
pub use retention::RetentionReport;
pub use risk_lists::ListType;
pub use store::Store;
pub use vector_memory::MemoryChunk;
