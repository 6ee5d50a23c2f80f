//! chainclaw-engine: the single always-on server process (spec.md §1, §2,
//! §6). Loads configuration, acquires the data-directory lock, wires every
//! leaf boundary and subsystem bottom-up ("leaves first"), serves the HTTP/
//! websocket router, and drives a bounded shutdown sequence on SIGINT/
//! SIGTERM.
//!
//! The serve-then-graceful-shutdown shape is grounded on
//! `tandem-server::http::run`'s `axum::serve(...).with_graceful_shutdown(
//! ctrl_c)` followed by aborting its background tasks
//! (`examples/iridite-tandem/crates/tandem-server/src/http.rs`).

mod boundaries;
mod config;
mod process_lock;
mod shutdown;

use std::path::PathBuf;
use std::sync::Arc;

use chainclaw_hooks::HookBus;
use chainclaw_memory::Store;
use chainclaw_observability::{init_process_logging, ProcessKind};
use chainclaw_pipeline::{reconcile_pending, RiskEngine, TransactionPipeline};
use chainclaw_providers::{llm::AnthropicStyleProvider, llm::OllamaStyleProvider, llm::OpenAiStyleProvider, LlmProvider, PriceOracle};
use chainclaw_server::{LoggingNotifier, SecurityPolicy, Server, ServerDeps};
use chainclaw_skills::{register_builtin_skills, SkillDeps, SkillRegistry};
use chainclaw_strategy::{AgentRunner, Marketplace, StrategyRegistry};
use clap::Parser;

use crate::config::{Config, LlmProviderKind, SecurityMode};

#[derive(Debug, Parser)]
#[command(name = "chainclaw-engine", about = "Self-hosted DeFi operations assistant backend")]
struct Cli {
    /// Path to an optional TOML configuration file; environment variables
    /// (`CHAINCLAW_*`) always take precedence over its contents.
    #[arg(long, env = "CHAINCLAW_CONFIG")]
    config: Option<PathBuf>,

    /// Port the HTTP/websocket router listens on.
    #[arg(long, env = "CHAINCLAW_PORT", default_value_t = 8080)]
    port: u16,
}

fn main() -> anyhow::Result<()> {
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }

    let cli = Cli::parse();
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            for error in &errors {
                eprintln!("config error: {error}");
            }
            std::process::exit(1);
        }
    };

    let runtime = tokio::runtime::Runtime::new()?;
    let exit_code = runtime.block_on(run(config, cli.port));
    std::process::exit(exit_code);
}

async fn run(config: Config, port: u16) -> i32 {
    let (_guard, _info) = match init_process_logging(ProcessKind::Engine, &config.data_dir.join("logs"), 14) {
        Ok(pair) => pair,
        Err(err) => {
            eprintln!("failed to initialize logging: {err}");
            return 1;
        }
    };

    let lock = match process_lock::ProcessLock::acquire(&config.data_dir) {
        Ok(lock) => lock,
        Err(err) => {
            tracing::error!(error = %err, "failed to acquire process lock");
            return 1;
        }
    };

    match boot(&config, port).await {
        Ok((server, listener, store)) => {
            let background = server.spawn_background();
            let app = server.http_router();

            let result = axum::serve(listener, app).with_graceful_shutdown(wait_for_shutdown_signal()).await;

            shutdown::run(&background, &store, Some(lock)).await;

            match result {
                Ok(()) => 0,
                Err(err) => {
                    tracing::error!(error = %err, "server exited with an error");
                    1
                }
            }
        }
        Err(err) => {
            tracing::error!(error = %err, "boot sequence failed");
            1
        }
    }
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received");
}

/// Constructs every leaf boundary and subsystem bottom-up, then the
/// top-level [`Server`] (spec.md §2 "leaves first"): store, hooks, risk
/// engine, pipeline, skill registry, strategy registry/agent runner/
/// marketplace, then the server itself and its listening socket.
async fn boot(config: &Config, port: u16) -> anyhow::Result<(Server, tokio::net::TcpListener, Arc<Store>)> {
    let store = Arc::new(Store::open(&config.data_dir).await?);
    let hooks = Arc::new(HookBus::new());

    let token_safety = Arc::new(boundaries::UnconfiguredTokenSafety);
    let contract_verification = Arc::new(boundaries::UnconfiguredContractVerification);
    let dex = Arc::new(boundaries::UnconfiguredDexAggregator);
    let bridge = Arc::new(boundaries::UnconfiguredBridgeAggregator);
    let lending = Arc::new(boundaries::UnconfiguredLendingPool);
    let simulator = Arc::new(boundaries::UnconfiguredSimulator);
    let chain_rpc = Arc::new(boundaries::UnconfiguredChainRpc);
    let signer: Arc<dyn chainclaw_providers::Signer> = Arc::new(boundaries::UnconfiguredSigner);
    let wallet_balance = Arc::new(boundaries::UnconfiguredWalletBalance);
    let price_feed = Arc::new(boundaries::UnconfiguredPriceFeed);
    let prices = Arc::new(PriceOracle::new(price_feed));

    let risk = Arc::new(RiskEngine::new(token_safety, contract_verification, store.clone()));
    let chain_rpc: Arc<dyn chainclaw_providers::ChainRpc> = chain_rpc;
    let pipeline = Arc::new(TransactionPipeline::new(
        risk.clone(),
        simulator,
        chain_rpc.clone(),
        signer.clone(),
        store.clone(),
        hooks.clone(),
    ));

    match reconcile_pending(&store, &chain_rpc).await {
        Ok(count) if count > 0 => tracing::info!(count, "reconciled non-terminal transactions at boot"),
        Ok(_) => {}
        Err(err) => tracing::warn!(error = %err, "boot reconciliation failed, continuing"),
    }

    let skills = SkillRegistry::new();
    let strategy_registry = StrategyRegistry::new();
    let agent_runner =
        AgentRunner::new(store.clone(), hooks.clone(), strategy_registry.clone(), prices.clone(), pipeline.clone());
    let marketplace = Marketplace::new(store.clone(), strategy_registry.clone(), agent_runner.clone());

    register_builtin_skills(
        &skills,
        SkillDeps {
            store: store.clone(),
            risk,
            wallet: wallet_balance,
            prices: prices.clone(),
            signer: signer.clone(),
            pipeline: pipeline.clone(),
            dex: dex.clone(),
            bridge,
            lending,
            strategy_registry,
            agent_runner,
            marketplace,
        },
    )
    .await;

    let llm: Arc<dyn LlmProvider> = build_llm_provider(config);
    let security = match config.security_mode {
        SecurityMode::Open => SecurityPolicy::Open,
        SecurityMode::Allowlist => SecurityPolicy::Allowlist(config.allowlist.iter().cloned().collect()),
    };

    let server = Server::new(ServerDeps {
        store: store.clone(),
        hooks,
        skills,
        llm,
        dex,
        signer,
        pipeline,
        prices,
        notifier: Arc::new(LoggingNotifier),
        security,
    });

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "chainclaw-engine listening");

    Ok((server, listener, store))
}

fn build_llm_provider(config: &Config) -> Arc<dyn LlmProvider> {
    match config.llm_provider {
        LlmProviderKind::Anthropic => Arc::new(AnthropicStyleProvider::new(
            config.llm_api_key.clone().unwrap_or_default(),
            "claude-sonnet-4-5".to_string(),
        )),
        LlmProviderKind::OpenAi => {
            Arc::new(OpenAiStyleProvider::new(config.llm_api_key.clone().unwrap_or_default(), "gpt-4o".to_string()))
        }
        LlmProviderKind::Ollama => Arc::new(OllamaStyleProvider::new("llama3".to_string())),
    }
}
