use hls_relay::{config, server};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Setup logging
    tracing_subscriber::fmt::init();

    info!("🚀 Starting hls-relay");

    let config = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Running in {} mode (connect timeout {:?}, read timeout {:?}, max redirects {}, private targets {})",
        if config.is_dev { "DEV" } else { "PROD" },
        config.connect_timeout,
        config.read_timeout,
        config.max_redirects,
        if config.block_private_targets { "blocked" } else { "allowed" },
    );
    if !config.base_url.is_empty() {
        info!("Rewritten links use base {}", config.base_url);
    }

    if let Err(e) = server::start(config).await {
        error!("Failed to start server: {}", e);
        std::process::exit(1);
    }
}
