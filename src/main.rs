//! hulk-boot service binary.
//!
//! Loads a TOML config, installs logging (and optionally the Prometheus exporter),
//! registers a health route on the gateway, and runs until interrupted.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;

use hulk_boot::config::{load_config, ConfigSource, ServiceConfig};
use hulk_boot::observability::{logging, metrics};
use hulk_boot::ServiceBuilder;

#[derive(Debug, Parser)]
#[command(name = "hulk-boot", version, about = "Run an RPC service with an HTTP gateway")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config/app.toml")]
    config: PathBuf,

    /// Service name used when `app.name` is not configured.
    #[arg(short, long, default_value = "hulk-boot")]
    name: String,
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    service: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let source = match load_config(&cli.config) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("hulk-boot: {e}");
            return ExitCode::FAILURE;
        }
    };

    logging::init(&source.get_string_or("log.level", "info"), source.is_prod_env());
    tracing::info!(path = %cli.config.display(), "Configuration loaded");

    if source.get_bool("metrics.enabled") {
        let address = source.get_string_or("metrics.address", "0.0.0.0:9090");
        match address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(e) => tracing::error!(address = %address, error = %e, "Invalid metrics address"),
        }
    }

    let config = ServiceConfig::from_source(&cli.name, &source);
    let service = config.name.clone();

    let supervisor = match ServiceBuilder::new(config)
        .attach_gateway(move |_ctx, router| {
            router.get("/v1/health", move |_: serde_json::Value| {
                let service = service.clone();
                async move {
                    Ok::<_, tonic::Status>(Health {
                        status: "ok",
                        service,
                    })
                }
            })?;
            Ok(())
        })
        .build()
    {
        Ok(supervisor) => supervisor,
        Err(e) => {
            tracing::error!(error = %e, "Invalid service configuration");
            eprintln!("hulk-boot: {e}");
            return ExitCode::FAILURE;
        }
    };

    match supervisor.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("hulk-boot: {e}");
            ExitCode::FAILURE
        }
    }
}
