#![cfg(not(tarpaulin_include))]

use log::info;
use partitioner::app;
use partitioner::config::ServerConfig;

/// Main entry point for the partitioning web server
///
/// Reads the configuration from the environment (and `.env`), sets up logging
/// and serves the upload page and its API until the process is stopped.
///
/// # Environment
/// * `SERVER_HOST`, `SERVER_PORT` - bind address (default `127.0.0.1:8080`)
/// * `UPLOAD_DIR` - where uploaded files are stored (default `uploads`)
/// * `STATIC_DIR` - directory served under `/static` (default `static`)
/// * `LOG_LEVEL` - log filter used when `RUST_LOG` is unset (default `info`)
/// * `MAX_UPLOAD_BYTES` - request body limit for uploads
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_level.as_str()),
    )
    .init();

    info!(
        "Starting partitioning server on {} (uploads in {})",
        config.bind_address(),
        config.upload_dir.display()
    );
    app::run(config).await
}
