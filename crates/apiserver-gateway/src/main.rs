mod cli;
mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use clap::Parser;
use tracing::{info, warn};

use http_gateway::{forward, router, AppState, ResponseCache};
use ws_relay::{BackendScheme, ProxyEndpoint, TlsTrustPolicy};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Parse CLI args.
    let cli = Cli::parse();

    // 2. Load config, then merge CLI overrides.
    let mut cfg = config::load(&cli.config)?;

    if let Some(ref listen) = cli.listen {
        cfg.server.listen_addr = listen.clone();
    }
    if let Some(ref host) = cli.backend_host {
        cfg.backend.host = host.clone();
    }
    if let Some(ref origin) = cli.origin {
        cfg.backend.origin = origin.clone();
    }
    if let Some(ref cert) = cli.tls_cert {
        cfg.server.tls_cert = cert.clone();
    }
    if let Some(ref key) = cli.tls_key {
        cfg.server.tls_key = key.clone();
    }

    // 3. Init tracing-subscriber with JSON format.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.logging.level));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();

    info!(
        config_file = %cli.config.display(),
        listen = %cfg.server.listen_addr,
        backend = %cfg.backend.host,
        "apiserver-gateway starting"
    );

    // 4. Resolve the backend endpoint.
    let scheme = match cfg.backend.scheme.to_lowercase().as_str() {
        "http" => BackendScheme::Http,
        _ => BackendScheme::Https,
    };

    let trust = match cfg.backend.verify.to_lowercase().as_str() {
        "system-roots" => TlsTrustPolicy::SystemRoots,
        _ => TlsTrustPolicy::InsecureSkipVerify,
    };
    if trust.skips_verification() {
        warn!("backend certificate verification is DISABLED (verify = insecure-skip-verify)");
    }

    let origin = if cfg.backend.origin.is_empty() {
        warn!("no expected origin configured; websocket upgrades accept any origin");
        None
    } else {
        Some(cfg.backend.origin.clone())
    };

    let endpoint = Arc::new(ProxyEndpoint {
        scheme,
        host: cfg.backend.host.clone(),
        trust,
        origin,
    });

    // 5. Build the backend client and the response cache.
    let client = forward::build_client(trust).context("failed to build backend client")?;
    let cache = Arc::new(ResponseCache::new(
        Duration::from_secs(cfg.cache.health_ttl_secs),
        Duration::from_secs(cfg.cache.api_ttl_secs),
    ));

    // 6. Build the router.
    let app = router(AppState {
        endpoint,
        client,
        cache,
    });

    // 7. Terminate client TLS with the operator-provided pair and serve.
    let addr: SocketAddr = cfg
        .server
        .listen_addr
        .parse()
        .context("invalid listen address")?;

    let tls = RustlsConfig::from_pem_file(&cfg.server.tls_cert, &cfg.server.tls_key)
        .await
        .with_context(|| {
            format!(
                "failed to load TLS certificate from {} / {}",
                cfg.server.tls_cert.display(),
                cfg.server.tls_key.display()
            )
        })?;

    let handle = Handle::new();
    tokio::spawn(shutdown_signal(handle.clone()));

    info!(%addr, api_cache_secs = cfg.cache.api_ttl_secs, "gateway listening");

    axum_server::bind_rustls(addr, tls)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .context("server error")?;

    info!("apiserver-gateway shut down");
    Ok(())
}

/// Wait for SIGINT or SIGTERM, then drain connections and stop.
async fn shutdown_signal(handle: Handle) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to register SIGTERM handler");

        tokio::select! {
            _ = ctrl_c => {
                info!("received SIGINT (ctrl-c)");
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("received SIGINT (ctrl-c)");
    }

    handle.graceful_shutdown(Some(Duration::from_secs(5)));
}
