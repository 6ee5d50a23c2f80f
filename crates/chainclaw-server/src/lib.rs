//! Command Router, Intent Parser, Agent Runtime, the Cron/DCA/Alert
//! schedulers, and the illustrative websocket channel adapter (spec.md
//! §4.2-§4.6, §6).
//!
//! `chainclaw-engine` owns process lifecycle: it constructs every boundary
//! and subsystem this crate's pieces close over, builds a [`Server`], and
//! drives its background tickers and HTTP router.

pub mod agent_runtime;
pub mod alert_engine;
pub mod command_router;
pub mod cron_scheduler;
pub mod dca_scheduler;
pub mod headless;
pub mod intent_parser;
pub mod rate_limit;
pub mod ws;

pub use agent_runtime::AgentRuntime;
pub use alert_engine::AlertEngine;
pub use command_router::{CommandRouter, SecurityPolicy};
pub use cron_scheduler::CronScheduler;
pub use dca_scheduler::DcaScheduler;
pub use headless::{HeadlessChannel, LoggingNotifier, Notifier};
pub use intent_parser::IntentParser;
pub use rate_limit::RateLimiter;
pub use ws::WsState;

use std::sync::Arc;

use axum::Router;
use chainclaw_hooks::HookBus;
use chainclaw_memory::Store;
use chainclaw_pipeline::TransactionPipeline;
use chainclaw_providers::{DexAggregator, EmbeddingProvider, LlmProvider, PriceOracle, Signer};
use chainclaw_skills::SkillRegistry;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;

/// Every leaf the server-side subsystems need, already constructed by the
/// engine's boot sequence (spec.md §2 "leaves first").
pub struct ServerDeps {
    pub store: Arc<Store>,
    pub hooks: Arc<HookBus>,
    pub skills: SkillRegistry,
    pub llm: Arc<dyn LlmProvider>,
    /// Semantic recall (spec.md §3); `None` degrades the Agent Runtime to
    /// recent-history-only context, not an error (spec.md §1).
    pub embeddings: Option<Arc<dyn EmbeddingProvider>>,
    pub dex: Arc<dyn DexAggregator>,
    pub signer: Arc<dyn Signer>,
    pub pipeline: Arc<TransactionPipeline>,
    pub prices: Arc<PriceOracle>,
    pub notifier: Arc<dyn Notifier>,
    pub security: SecurityPolicy,
}

/// The assembled set of request-handling and background subsystems
/// (spec.md §4.3-§4.6). Constructed once at boot; never replaced.
pub struct Server {
    pub router: Arc<CommandRouter>,
    pub cron: Arc<CronScheduler>,
    pub dca: Arc<DcaScheduler>,
    pub alerts: Arc<AlertEngine>,
    ws_state: Arc<WsState>,
}

impl Server {
    pub fn new(deps: ServerDeps) -> Self {
        let parser = IntentParser::new(deps.llm);
        let mut runtime = AgentRuntime::new(deps.store.clone(), parser, deps.skills.clone());
        if let Some(embeddings) = deps.embeddings {
            runtime = runtime.with_embeddings(embeddings);
        }
        let runtime = Arc::new(runtime);
        let router = Arc::new(CommandRouter::with_security(deps.store.clone(), runtime, deps.security));
        let cron = Arc::new(CronScheduler::new(deps.store.clone(), deps.skills.clone(), deps.hooks.clone()));
        let dca = Arc::new(DcaScheduler::new(deps.store.clone(), deps.dex, deps.signer, deps.pipeline, deps.hooks));
        let alerts = Arc::new(AlertEngine::new(deps.store, deps.prices, deps.notifier));
        let ws_state = Arc::new(WsState::new(router.clone()));
        Self { router, cron, dca, alerts, ws_state }
    }

    /// The illustrative websocket web channel adapter (spec.md §6), mounted
    /// under `/ws`.
    pub fn http_router(&self) -> Router {
        Router::new().merge(ws::routes(self.ws_state.clone())).layer(CorsLayer::permissive())
    }

    /// Spawns the three independent background tickers (spec.md §4.5,
    /// §4.6). Each loop runs until its task is aborted; the shutdown
    /// driver (`chainclaw-engine`) aborts all three as its "stop timers"
    /// step (spec.md §5 "Cancellation").
    pub fn spawn_background(&self) -> BackgroundTasks {
        BackgroundTasks {
            cron: tokio::spawn(self.cron.clone().run()),
            dca: tokio::spawn(self.dca.clone().run()),
            alerts: tokio::spawn(self.alerts.clone().run()),
        }
    }
}

pub struct BackgroundTasks {
    pub cron: JoinHandle<()>,
    pub dca: JoinHandle<()>,
    pub alerts: JoinHandle<()>,
}

impl BackgroundTasks {
    /// Aborts every background ticker. Intentionally immediate rather than
    /// cooperative: none of the three loops holds a resource that needs a
    /// graceful drain beyond what the pipeline/store already guarantee per
    /// write (spec.md §5 "stop all timers").
    pub fn stop_all(&self) {
        self.cron.abort();
        self.dca.abort();
        self.alerts.abort();
    }
}
