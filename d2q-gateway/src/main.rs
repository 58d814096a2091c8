use std::fs::{self, File};
use std::sync::{Arc, Mutex};

use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use d2q_core::{Config, LoggingSettings};
use d2q_gateway::providers::build_provider;
use d2q_gateway::server;
use d2q_gateway::state::AppState;
use d2q_store::Store;

/// Plain-text log file writer when `[logging].file_enabled` is set.
fn open_log_file(logging: &LoggingSettings) -> std::io::Result<Option<Mutex<File>>> {
    if !logging.file_enabled {
        return Ok(None);
    }
    let path = logging.log_file_path();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = File::options().create(true).append(true).open(path)?;
    Ok(Some(Mutex::new(file)))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    d2q_core::load_dotenv();

    // Configuration comes first since it names the log level and log file
    let config = Config::load()?;
    let logging = &config.settings.logging;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let file_layer = open_log_file(logging)?.map(|writer| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer)
    });
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    info!(
        "Configuration loaded (llm: {}/{})",
        config.settings.llm.provider, config.settings.llm.model
    );

    let store = Store::from_settings(&config.settings.storage).await?;
    info!(
        "Store opened (data: {}, files: {})",
        store.data_dir().display(),
        store.file_dir().display()
    );

    let provider = match config.llm_api_key() {
        Some(api_key) => Some(build_provider(&config.settings.llm, logging, api_key)?),
        None => {
            warn!(
                "No LLM client - set {} to enable extraction and generation",
                config.settings.llm.api_key_env()
            );
            None
        }
    };

    let state = Arc::new(AppState::new(store, provider));

    let host = &config.settings.gateway.host;
    if host != "127.0.0.1" && host != "localhost" {
        warn!(
            "Gateway binding to non-localhost address: {}. The API has no authentication.",
            host
        );
    }

    let bind_addr = config.bind_addr();
    info!("Starting d2q server on {}", bind_addr);
    server::run(state, &bind_addr).await
}
