use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use certhub::server::ServerConfig;
use certhub::token::DEFAULT_TTL_SECS;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let http_port: u16 = std::env::var("CERTHUB_HTTP_PORT")
        .unwrap_or_else(|_| "7878".to_string())
        .parse()?;
    let ttl_secs: u64 = std::env::var("CERTHUB_TOKEN_TTL_SECS")
        .unwrap_or_else(|_| DEFAULT_TTL_SECS.to_string())
        .parse()?;
    let asset_root = std::env::var("CERTHUB_ASSET_ROOT").unwrap_or_else(|_| "assets".to_string());

    let secret = match std::env::var("CERTHUB_SECRET") {
        Ok(s) if !s.is_empty() => s.into_bytes(),
        _ => {
            // Tokens signed with an ephemeral secret die with the process.
            warn!("CERTHUB_SECRET not set; generating an ephemeral signing secret");
            let mut bytes = [0u8; 32];
            getrandom::getrandom(&mut bytes)?;
            bytes.to_vec()
        }
    };

    // Startup banner at info level so something always prints at default verbosity
    info!(
        target: "certhub",
        "certhub starting: RUST_LOG='{}', http_port={}, token_ttl_secs={}, asset_root='{}'",
        rust_log, http_port, ttl_secs, asset_root
    );

    certhub::server::run_with_config(ServerConfig {
        http_port,
        secret,
        token_ttl: Duration::from_secs(ttl_secs),
        asset_root,
    })
    .await
}
