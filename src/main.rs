//! qrpair - multi-device QR pairing server
//!
//! One client displays a rotating sequence of code parts, another device
//! scans them and submits derived tokens over a WebSocket. The server tracks
//! every pairing session, validates tokens with replay protection and
//! broadcasts live progress to all connected observers.

use anyhow::Result;
use clap::Parser;
use qrpair_core::{PairingConfig, SharedConfig};
use qrpair_server::{create_router, AppState, TlsMaterial};
use qrpair_session::{ExpiryPolicy, ExpirySweeper};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

/// qrpair - pair devices by scanning a rotating QR sequence
#[derive(Parser, Debug)]
#[command(name = "qrpair")]
#[command(version, about, long_about = None)]
struct Args {
    /// Server port
    #[arg(short, long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Secret from which the published public key is derived
    #[arg(long, env = "SECRET_KEY", default_value = "ChangeMe123!", hide_env_values = true)]
    secret_key: String,

    /// Allowed CORS origin ("*" allows any)
    #[arg(long, env = "CORS_ORIGIN", default_value = "*")]
    cors_origin: String,

    /// Path to TLS certificate file (PEM format)
    #[arg(long, env = "CERT_CRT_PATH")]
    cert: Option<PathBuf>,

    /// Path to TLS private key file (PEM format)
    #[arg(long, env = "CERT_KEY_PATH")]
    key: Option<PathBuf>,

    /// Serve HTTPS with an in-memory self-signed certificate
    /// when no certificate files are given
    #[arg(long)]
    self_signed: bool,

    /// Serve static files from this directory instead of the embedded dashboard
    #[arg(long, env = "PUBLIC_DIR")]
    public_dir: Option<PathBuf>,

    /// Number of code parts per session
    #[arg(long, env = "PARTS_COUNT", default_value = "20", value_parser = clap::value_parser!(u32).range(1..))]
    parts_count: u32,

    /// Number of distinct tokens required to complete a session
    #[arg(long, env = "REQUIRED_TOKENS", default_value = "2", value_parser = clap::value_parser!(u32).range(1..))]
    required_tokens: u32,

    /// Restrict tokens to a single client
    #[arg(long)]
    single_client_only: bool,

    /// Seconds between expiry sweeps
    #[arg(long, default_value = "5")]
    sweep_interval_secs: u64,

    /// Evict sessions with no scanned part after this many seconds
    #[arg(long, default_value = "30")]
    no_scan_timeout_secs: u64,

    /// Evict started sessions idle for this many seconds
    #[arg(long, default_value = "60")]
    inactivity_timeout_secs: u64,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    info!("qrpair v{}", env!("CARGO_PKG_VERSION"));

    let tls = match (&args.cert, &args.key) {
        (Some(cert), Some(key)) => Some(TlsMaterial::from_files(cert, key)?),
        (None, None) if args.self_signed => {
            Some(TlsMaterial::self_signed(&[])?)
        }
        (None, None) => None,
        _ => anyhow::bail!("--cert and --key must be given together"),
    };

    let initial = PairingConfig::new()
        .with_parts_count(args.parts_count)
        .with_required_tokens(args.required_tokens)
        .with_single_client_only(args.single_client_only);
    initial.validate()?;
    let config = SharedConfig::new(initial);

    if args.secret_key == "ChangeMe123!" {
        warn!("Using the default secret key; set SECRET_KEY for real deployments");
    }

    let state = Arc::new(
        AppState::new(config.clone(), &args.secret_key, tls.is_some())
            .with_cors_origin(args.cors_origin.clone())
            .with_public_dir(args.public_dir.clone()),
    );

    let policy = ExpiryPolicy {
        interval: Duration::from_secs(args.sweep_interval_secs.max(1)),
        no_scan_timeout: Duration::from_secs(args.no_scan_timeout_secs),
        inactivity_timeout: Duration::from_secs(args.inactivity_timeout_secs),
    };
    let sweeper = ExpirySweeper::new(state.manager.clone(), policy).spawn();

    let current = config.get();
    info!(
        "Sessions: {} parts, {} required tokens, single client only: {}",
        current.parts_count, current.required_tokens, current.single_client_only
    );
    info!("Public key: {}", state.public_key);

    let router = create_router(state.clone());
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], args.port));

    // Run server with graceful shutdown
    if let Some(tls) = tls {
        info!("Certificate fingerprint: {}", tls.fingerprint);
        let tls_config = tls.rustls_config().await?;

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();

        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down...");
            shutdown_handle.graceful_shutdown(Some(Duration::from_secs(5)));
        });

        info!("Server running on https://{}", addr);
        axum_server::bind_rustls(addr, tls_config)
            .handle(handle)
            .serve(router.into_make_service())
            .await?;
    } else {
        let shutdown = async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down...");
        };

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Server running on http://{}", addr);
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;
    }

    sweeper.abort();
    info!(
        "Goodbye! ({} tokens consumed this run)",
        state.manager.consumed_tokens().await
    );
    Ok(())
}
