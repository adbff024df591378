use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig as _;

use ac_domain::config::{Config, CorsConfig, ObservabilityConfig};
use ac_server::api;
use ac_server::bootstrap;
use ac_server::cli::{Cli, Command, ConfigCommand, EngineCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to serve when no subcommand is given.
        None | Some(Command::Serve) => {
            let (config, _config_path) = ac_server::cli::load_config()?;
            let tracer_provider = init_tracing(&config.observability);
            run_server(Arc::new(config), tracer_provider).await
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = ac_server::cli::load_config()?;
            if !ac_server::cli::config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _config_path) = ac_server::cli::load_config()?;
            ac_server::cli::config::show(&config);
            Ok(())
        }
        Some(Command::Engine(EngineCommand::Check { model, prompt, json })) => {
            init_cli_tracing();
            let (config, _) = ac_server::cli::load_config()?;
            ac_server::cli::engine::check(Arc::new(config), model, prompt, json).await
        }
        Some(Command::Version) => {
            println!("aicall {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Initialize structured JSON tracing (only for the `serve` command).
///
/// When `otlp_endpoint` is configured, an OpenTelemetry layer is added
/// so that every `tracing` span is also exported via OTLP/gRPC. The
/// returned provider must be shut down on exit to flush pending spans.
fn init_tracing(obs: &ObservabilityConfig) -> Option<opentelemetry_sdk::trace::SdkTracerProvider> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ac_runtime=debug,ac_server=debug"));

    let fmt_layer = tracing_subscriber::fmt::layer().json();

    let Some(endpoint) = &obs.otlp_endpoint else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
        return None;
    };

    let exporter = match opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
    {
        Ok(e) => e,
        Err(e) => {
            eprintln!("WARNING: failed to create OTLP exporter for {endpoint}: {e}, starting without OpenTelemetry");
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .init();
            return None;
        }
    };

    let resource = opentelemetry_sdk::Resource::builder()
        .with_service_name(obs.service_name.clone())
        .build();

    let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(opentelemetry_sdk::trace::Sampler::TraceIdRatioBased(obs.sample_rate))
        .with_resource(resource)
        .build();

    let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer_provider.tracer("aicall"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .init();

    Some(tracer_provider)
}

/// Compact stderr-only tracing for one-shot CLI commands.
fn init_cli_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

async fn run_server(
    config: Arc<Config>,
    tracer_provider: Option<opentelemetry_sdk::trace::SdkTracerProvider>,
) -> anyhow::Result<()> {
    tracing::info!("aicall manager starting");

    let shutdown = CancellationToken::new();
    let state = bootstrap::build_app_state(config.clone(), shutdown.clone())?;

    let cors_layer = build_cors_layer(&config.server.cors);

    // ── Concurrency limit (backpressure protection) ────────────────
    let max_concurrent = std::env::var("AC_MAX_CONCURRENT_REQUESTS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(256);
    tracing::info!(max_concurrent, "concurrency limit set");

    let app = api::router(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_concurrent))
        .with_state(state.clone());

    // ── Bind ─────────────────────────────────────────────────────────
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    tracing::info!(addr = %addr, "aicall manager listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .context("axum server error")?;

    // ── Post-shutdown flush ─────────────────────────────────────────
    // Stop in-flight turns and initializations before the final flush.
    shutdown.cancel();
    tracing::info!("server stopped, flushing store...");

    if let Err(e) = state.store.flush().await {
        tracing::warn!(error = %e, "store flush on shutdown failed");
    }

    if let Some(provider) = tracer_provider {
        if let Err(e) = provider.shutdown() {
            tracing::warn!(error = ?e, "OpenTelemetry tracer provider shutdown failed");
        }
    }

    tracing::info!("shutdown complete");
    Ok(())
}

/// Wait for SIGINT, SIGTERM, or cancellation of `token`.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                    _ = token.cancelled() => tracing::info!("shutdown requested"),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to register SIGTERM handler");
                tokio::select! {
                    _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
                    _ = token.cancelled() => tracing::info!("shutdown requested"),
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
            _ = token.cancelled() => tracing::info!("shutdown requested"),
        }
    }
}

/// Build a [`CorsLayer`] from the configured allowed origins.
///
/// Origins ending in `:*` match any port on that host. A lone `"*"` allows
/// every origin.
fn build_cors_layer(cors: &CorsConfig) -> CorsLayer {
    use axum::http::header;

    let methods = [Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS];

    if cors.allowed_origins.len() == 1 && cors.allowed_origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\", all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    }

    let mut exact: Vec<HeaderValue> = Vec::new();
    let mut wildcard_prefixes: Vec<String> = Vec::new();

    for origin in &cors.allowed_origins {
        if origin.ends_with(":*") {
            wildcard_prefixes.push(origin.trim_end_matches('*').to_owned());
        } else if let Ok(hv) = origin.parse::<HeaderValue>() {
            exact.push(hv);
        } else {
            tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
        }
    }

    let allow_origin = if wildcard_prefixes.is_empty() {
        AllowOrigin::list(exact)
    } else {
        AllowOrigin::predicate(move |origin, _| {
            if exact.iter().any(|e| e.as_bytes() == origin.as_bytes()) {
                return true;
            }
            let origin_str = origin.to_str().unwrap_or("");
            wildcard_prefixes.iter().any(|prefix| {
                origin_str
                    .strip_prefix(prefix.as_str())
                    .map(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(false)
            })
        })
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(methods)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
