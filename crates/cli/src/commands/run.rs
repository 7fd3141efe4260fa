//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::{RelayBlueprint, SourceConfig, SourceKind};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_relay(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(&args.config).into());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    apply_overrides(&mut blueprint, args);

    // Overrides bypass the loader, so validate again.
    config_loader::validate(&blueprint).context("Invalid configuration after CLI overrides")?;

    for warning in config_loader::ConfigLoader::warnings(&blueprint) {
        warn!("{}", warning);
    }

    info!(
        url = %blueprint.store.url,
        routes = blueprint.routes.len(),
        flush_interval_ms = blueprint.dispatch.flush_interval_ms,
        concurrency = blueprint.consumer.concurrency,
        dry_run = args.dry_run,
        "Configuration loaded"
    );

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        metrics_port: (args.metrics_port != 0).then_some(args.metrics_port),
        dry_run: args.dry_run,
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let signal_task = tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Received shutdown signal, draining in-flight messages...");
        let _ = shutdown_tx.send(true);
    });

    info!("Starting relay...");
    let result = pipeline.run(shutdown_rx).await;
    signal_task.abort();

    let stats = result.context("Relay execution failed")?;
    info!(
        received = stats.consumer.received,
        dispatched = stats.dispatch.dispatched,
        discarded = stats.dispatch.discarded(),
        duration_secs = stats.duration.as_secs_f64(),
        "Relay completed"
    );
    stats.print_summary();

    info!("redis-relay finished");
    Ok(())
}

/// Apply `--redis-url`, `--flush-interval-ms` and `--input`
fn apply_overrides(blueprint: &mut RelayBlueprint, args: &RunArgs) {
    if let Some(ref url) = args.redis_url {
        info!(url = %url, "Overriding Redis URL from CLI");
        blueprint.store.url = url.clone();
    }
    if let Some(ms) = args.flush_interval_ms {
        info!(flush_interval_ms = ms, "Overriding flush interval from CLI");
        blueprint.dispatch.flush_interval_ms = ms;
    }
    if let Some(ref path) = args.input {
        info!(path = %path.display(), "Overriding message source from CLI");
        blueprint.source = SourceConfig {
            kind: SourceKind::File,
            path: Some(path.clone()),
        };
    }
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    const CONFIG: &str = r#"
[store]
url = "redis://127.0.0.1:6379"

[[routes]]
name = "live"
kind = "publish"
format = "chan:{id}"
"#;

    #[test]
    fn test_apply_overrides() {
        let mut blueprint = config_loader::ConfigLoader::load_from_str(
            CONFIG,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();

        let cli = crate::cli::Cli::try_parse_from([
            "redis-relay",
            "run",
            "--redis-url",
            "redis://other:6380",
            "--flush-interval-ms",
            "100",
            "--input",
            "in.ndjson",
        ])
        .unwrap();
        let crate::cli::Commands::Run(args) = cli.command else {
            panic!("expected run");
        };

        apply_overrides(&mut blueprint, &args);

        assert_eq!(blueprint.store.url, "redis://other:6380");
        assert_eq!(blueprint.dispatch.flush_interval_ms, 100);
        assert_eq!(blueprint.source.kind, SourceKind::File);
        assert!(config_loader::validate(&blueprint).is_ok());
    }

    #[test]
    fn test_negative_override_fails_validation() {
        let mut blueprint = config_loader::ConfigLoader::load_from_str(
            CONFIG,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();
        blueprint.dispatch.flush_interval_ms = -10;
        assert!(config_loader::validate(&blueprint).is_err());
    }
}
