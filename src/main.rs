use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::TimeDelta;
use clap::Parser;
use lexis_auth::SessionPolicy;
use lexis_server::{secs_or_none, LexisServer, ServerConfig, ServerContext};
use lexis_services::ChatLimits;
use lexis_settings::{load_settings, LexisSettings, LogFormat};
use lexis_store::seed::seed_demo_data;
use lexis_telemetry::{init_telemetry, OutputFormat, TelemetryConfig};

#[derive(Parser, Debug)]
#[command(name = "lexis", version, about = "Lexis language learning server")]
struct Cli {
    /// Host to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (0 picks a free port)
    #[arg(long, short)]
    port: Option<u16>,

    /// JSON settings file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Default log level (RUST_LOG takes precedence)
    #[arg(long)]
    log_level: Option<String>,

    /// Load demo accounts and content
    #[arg(long)]
    seed: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = load_settings(cli.config.as_deref()).context("failed to load settings")?;
    if let Some(host) = cli.host {
        settings.server.host = host;
    }
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    if let Some(level) = cli.log_level {
        settings.logging.level = level;
    }
    settings.seed_demo_data |= cli.seed;
    settings.validate().context("invalid settings")?;

    init_telemetry(&telemetry_config(&settings)).context("failed to initialise logging")?;

    let ctx = Arc::new(ServerContext::in_memory(server_config(&settings)?));
    if settings.seed_demo_data {
        let summary = seed_demo_data(&ctx.repos).context("failed to seed demo data")?;
        tracing::info!(?summary, "demo data loaded");
    }

    let server = LexisServer::bind(ctx).context("failed to start server")?;
    tracing::info!(addr = %server.local_addr(), "starting lexis");
    server.run().context("server failed")?;
    Ok(())
}

fn telemetry_config(settings: &LexisSettings) -> TelemetryConfig {
    TelemetryConfig {
        level: settings.logging.level.clone(),
        format: match settings.logging.format {
            LogFormat::Text => OutputFormat::Text,
            LogFormat::Json => OutputFormat::Json,
        },
        module_levels: settings
            .logging
            .modules
            .iter()
            .map(|(module, level)| (module.clone(), level.clone()))
            .collect(),
    }
}

fn server_config(settings: &LexisSettings) -> Result<ServerConfig> {
    let ttl_secs = i64::try_from(settings.session.ttl_secs).context("session.ttlSecs is too large")?;
    Ok(ServerConfig {
        host: settings.server.host.clone(),
        port: settings.server.port,
        max_connections: settings.server.max_connections,
        max_frame_bytes: settings.server.max_frame_bytes,
        idle_timeout: secs_or_none(settings.server.idle_timeout_secs),
        write_timeout: secs_or_none(settings.server.write_timeout_secs),
        sweep_interval: secs_or_none(settings.session.sweep_interval_secs),
        session: SessionPolicy {
            ttl: TimeDelta::try_seconds(ttl_secs).context("session.ttlSecs is out of range")?,
            sliding: settings.session.sliding,
        },
        chat: ChatLimits {
            max_message_chars: settings.chat.max_message_chars,
            history_limit: settings.chat.history_limit,
        },
    })
}
