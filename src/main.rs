#![cfg_attr(not(test), deny(clippy::panic))]

use arena_relay_server::auth::AclGuard;
use arena_relay_server::config;
use arena_relay_server::logging;
use arena_relay_server::session_server::{self, Services};
use arena_relay_server::state::AppState;
use arena_relay_server::storage::Storage;
use arena_relay_server::symbols::SymbolCache;
use clap::Parser;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Arena relay -- authentication, profile, matching and game-server
/// registration hub for a multiplayer VR arena game.
#[derive(Parser, Debug)]
#[command(name = "arena-relay-server")]
#[command(about = "Central relay server for a multiplayer VR arena game")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines and pre-deployment checks.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    /// Useful for debugging configuration loading from multiple sources.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration from config.json if present; otherwise use code defaults.
    let cfg = config::load();

    // Handle --print-config: output the loaded configuration as JSON
    if cli.print_config {
        let json = serde_json::to_string_pretty(&cfg)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    // Validate configuration security. `config::load()` already calls this
    // but only logs errors to stderr and continues; capture the result here
    // to fail startup (or exit with a proper code under --validate-config).
    let validation_result = config::validate_config_security(&cfg);

    if cli.validate_config {
        match validation_result {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Port: {}", cfg.server.bind_port);
                println!("  Region: {}", cfg.server.region_id);
                println!("  Storage backend: {:?}", cfg.storage);
                println!("  TLS enabled: {}", cfg.security.transport.tls.enabled);
                println!(
                    "  ServerDB api key required: {}",
                    cfg.security.server_db_api_key.is_some()
                );
                println!("  ACL enforced: {}", cfg.security.acl_path.is_some());
                println!("  Ranking policy: {:?}", cfg.matching.ranking_policy);
                return Ok(());
            }
            Err(e) => {
                eprintln!("Configuration validation failed:\n{e}");
                std::process::exit(1);
            }
        }
    }

    // In normal operation, propagate validation errors.
    validation_result?;

    logging::init_with_config(&cfg.logging);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.server.bind_port));
    tracing::info!(%addr, region = %cfg.server.region_id, "OnServerStarted");

    let symbols = if Path::new(&cfg.symbols.path).exists() {
        SymbolCache::load_from_file(Path::new(&cfg.symbols.path))
            .map_err(|err| anyhow::anyhow!("failed to load symbol cache: {err}"))?
    } else {
        tracing::warn!(path = %cfg.symbols.path, "symbol cache file not found, starting with an empty cache");
        SymbolCache::empty()
    };

    let metrics = Arc::new(arena_relay_server::metrics::ServerMetrics::new());

    let backend_kind = cfg.storage.to_backend_kind()?;
    let backend = arena_relay_server::storage::create_backend(backend_kind).await?;
    let storage = Storage::with_metrics(backend, metrics.clone());

    let acl = AclGuard::load(cfg.security.acl_path.as_deref())?;

    let state = Arc::new(AppState::new(cfg, storage, symbols, acl, metrics));
    Arc::clone(&state.login_attempts).start_cleanup_task();
    Arc::clone(&state.matching_attempts).start_cleanup_task();
    Arc::clone(&state.serverdb_attempts).start_cleanup_task();

    let services = Arc::new(Services::new(state.clone()));
    let router = session_server::router(state.clone(), services);
    let make_service = router.into_make_service_with_connect_info::<SocketAddr>();

    let grace_period = Duration::from_secs(state.config.server.shutdown_grace_period_secs);

    #[cfg(feature = "tls")]
    if state.config.security.transport.tls.enabled {
        let tls_config = arena_relay_server::security::build_rustls_config(
            &state.config.security.transport.tls,
        )
        .map_err(|err| anyhow::anyhow!("failed to initialize TLS configuration: {err}"))?;

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            tracing::info!(grace_period_secs = grace_period.as_secs(), "shutdown signal received, draining connections");
            shutdown_handle.graceful_shutdown(Some(grace_period));
        });

        tracing::info!(%addr, "session server listening over TLS");
        axum_server::bind_rustls(addr, tls_config)
            .handle(handle)
            .serve(make_service)
            .await?;
        state.session_cache.clear();
        tracing::info!("OnServerStopped");
        return Ok(());
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "session server listening");

    let shutdown = Arc::new(tokio::sync::Notify::new());
    let notify_serve = shutdown.clone();
    let serve = axum::serve(listener, make_service)
        .with_graceful_shutdown(async move { notify_serve.notified().await });

    tokio::select! {
        result = serve => { result?; }
        _ = async {
            shutdown_signal().await;
            tracing::info!(grace_period_secs = grace_period.as_secs(), "shutdown signal received, draining connections");
            shutdown.notify_waiters();
            tokio::time::sleep(grace_period).await;
        } => {
            tracing::warn!("shutdown grace period elapsed, forcing exit");
        }
    }

    state.session_cache.clear();
    tracing::info!("OnServerStopped");

    Ok(())
}

/// Resolves once Ctrl+C or (on Unix) SIGTERM is received, so the caller can
/// begin a grace-period-bounded shutdown (spec §5).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod cli_tests {
    use super::Cli;
    use clap::Parser;

    #[test]
    fn test_cli_default_no_flags() {
        let cli = Cli::try_parse_from(["arena-relay-server"]).unwrap();
        assert!(!cli.validate_config);
        assert!(!cli.print_config);
    }

    #[test]
    fn test_cli_validate_config_long() {
        let cli = Cli::try_parse_from(["arena-relay-server", "--validate-config"]).unwrap();
        assert!(cli.validate_config);
        assert!(!cli.print_config);
    }

    #[test]
    fn test_cli_validate_config_short() {
        let cli = Cli::try_parse_from(["arena-relay-server", "-c"]).unwrap();
        assert!(cli.validate_config);
        assert!(!cli.print_config);
    }

    #[test]
    fn test_cli_print_config() {
        let cli = Cli::try_parse_from(["arena-relay-server", "--print-config"]).unwrap();
        assert!(!cli.validate_config);
        assert!(cli.print_config);
    }

    #[test]
    fn test_cli_validate_and_print_config_conflict() {
        let result =
            Cli::try_parse_from(["arena-relay-server", "--validate-config", "--print-config"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("cannot be used with"));
    }

    #[test]
    fn test_cli_version() {
        let result = Cli::try_parse_from(["arena-relay-server", "--version"]);
        assert!(result.is_err());
    }
}
