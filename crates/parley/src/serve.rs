// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parley serve` command implementation.
//!
//! Wires SQLite storage, the two OpenAI-compatible endpoints, the
//! generation engine and the HTTP gateway, then serves until SIGINT or
//! SIGTERM. On shutdown the gateway stops accepting connections while the
//! engine cancels running generations, which ends their open event streams.

use std::sync::Arc;
use std::time::Duration;

use parley_config::model::ParleyConfig;
use parley_core::{ChatStore, LlmClient, ParleyError, SnowflakeGenerator};
use parley_engine::{EngineParts, GenerationEngine};
use parley_gateway::{start_server, GatewayState, ServerConfig};
use parley_openai::OpenAiProvider;
use parley_storage::SqliteStore;
use tracing::{info, warn};

use crate::shutdown;

/// Time running generations get to wind down after cancellation.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Node id embedded in conversation ids minted by this process.
const SNOWFLAKE_NODE: u16 = 1;

/// Runs the `parley serve` command.
pub async fn run_serve(config: ParleyConfig) -> Result<(), ParleyError> {
    init_tracing(&config.server.log_level);
    info!(version = env!("CARGO_PKG_VERSION"), "starting parley");

    let store = Arc::new(SqliteStore::new(config.storage.clone()));
    store.initialize().await?;
    info!(path = %config.storage.database_path, "storage initialized");

    let llm = Arc::new(OpenAiProvider::from_upstream(&config.upstream)?);
    let secondary = Arc::new(OpenAiProvider::from_secondary(
        &config.secondary,
        &config.upstream,
    )?);
    if config.models.is_empty() {
        warn!("model catalog is empty, every generate request will be rejected");
    }

    let engine = Arc::new(GenerationEngine::new(EngineParts {
        store: Arc::clone(&store) as Arc<dyn ChatStore>,
        llm: llm as Arc<dyn LlmClient>,
        secondary: secondary as Arc<dyn LlmClient>,
        models: config.models.clone(),
        engine: config.engine.clone(),
        naming_model: config.secondary.naming_model.clone(),
        vision_model: config.secondary.vision_model.clone(),
    }));

    let state = GatewayState::new(
        Arc::clone(&engine),
        Arc::clone(&store) as Arc<dyn ChatStore>,
        Arc::new(SnowflakeGenerator::new(SNOWFLAKE_NODE)),
    );
    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };

    let cancel = shutdown::install_signal_handler();

    let server = async {
        let result = start_server(&server_config, state, cancel.clone()).await;
        // A bind failure must still release the drain below.
        cancel.cancel();
        result
    };
    let drain = async {
        cancel.cancelled().await;
        info!(
            active = engine.active_generations(),
            "cancelling running generations"
        );
        engine.shutdown(DRAIN_TIMEOUT).await;
    };
    let (served, ()) = tokio::join!(server, drain);

    if let Err(e) = store.close().await {
        warn!(error = %e, "failed to close storage");
    }
    info!("parley stopped");
    served
}

/// Initialize the tracing subscriber with an env filter.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("parley={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
