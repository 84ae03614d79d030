use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

use mne::config::{self, Config, StoreBackend};
use mne::middleware::auth::{ttl_from_hours, JwtAuthProvider};
use mne::middleware::rbac::Role;
use mne::models::{Actor, Status, Variant};
use mne::store::memory::MemoryStore;
use mne::store::postgres::PgStore;
use mne::store::EntityStore;
use mne::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Export spans over OTLP only when an endpoint is configured.
    use opentelemetry::KeyValue;

    use opentelemetry_sdk::{trace as sdktrace, Resource};

    let otel_enabled = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok();
    let telemetry_layer = if otel_enabled {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "mne-registry"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .context("failed to install OpenTelemetry tracer")?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    let json_logs = std::env::var("MNE_LOG_JSON")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let (plain_layer, json_layer) = if json_logs {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "mne=debug,tower_http=debug".into()),
        ))
        .with(plain_layer)
        .with(json_layer)
        .with(telemetry_layer)
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(cli::Commands::Item { command }) => handle_item_command(cfg, command).await,
        Some(cli::Commands::Token { command }) => handle_token_command(&cfg, command),
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if otel_enabled {
        opentelemetry::global::shutdown_tracer_provider();
    }

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn open_store(cfg: &Config) -> anyhow::Result<Arc<dyn EntityStore>> {
    match cfg.store {
        StoreBackend::Postgres => {
            tracing::info!("Connecting to database...");
            let db = PgStore::connect(&cfg.database_url)
                .await
                .context("failed to connect to DATABASE_URL")?;

            tracing::info!("Running migrations...");
            db.migrate().await?;
            Ok(Arc::new(db))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn run_server(cfg: Config, port: u16) -> anyhow::Result<()> {
    let store = open_store(&cfg).await?;

    tracing::info!(
        approvers = ?cfg.approver_roles.iter().map(Role::to_string).collect::<Vec<_>>(),
        variants = ?cfg.enabled_variants,
        "Approval workflow configured"
    );

    let dashboard_origin = cfg.dashboard_origin.clone();
    let state = Arc::new(AppState::new(cfg, store)?);

    let app = mne::api::app(state)
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(tower::limit::ConcurrencyLimitLayer::new(512))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer({
            use axum::http::{HeaderName, Method};
            use tower_http::cors::AllowOrigin;
            CorsLayer::new()
                .allow_origin(AllowOrigin::predicate(move |origin, _| {
                    let origin_str = origin.to_str().unwrap_or("");
                    origin_str == dashboard_origin
                        || origin_str.starts_with("http://localhost:")
                        || origin_str.starts_with("http://127.0.0.1:")
                }))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::OPTIONS,
                ])
                // Browsers refuse AllowHeaders::any() together with allow_credentials(true)
                .allow_headers([
                    HeaderName::from_static("content-type"),
                    HeaderName::from_static("authorization"),
                    HeaderName::from_static("x-request-id"),
                ])
                .allow_credentials(true)
        })
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(axum::middleware::from_fn(security_headers_middleware));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("M&E registry listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}

/// Middleware: injects a unique X-Request-Id into every response.
/// This allows clients to correlate errors with server logs.
async fn request_id_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

/// Middleware: injects security headers into every response.
async fn security_headers_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();

    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    // Beneficiary records are personal data; never let intermediaries cache them.
    headers.insert("Cache-Control", HeaderValue::from_static("no-store"));
    headers.insert("Referrer-Policy", HeaderValue::from_static("no-referrer"));
    headers.remove("Server");

    resp
}

fn parse_variant(raw: &str) -> anyhow::Result<Variant> {
    raw.parse().map_err(anyhow::Error::msg)
}

async fn handle_item_command(cfg: Config, cmd: cli::ItemCommands) -> anyhow::Result<()> {
    let store = open_store(&cfg).await?;
    let state = AppState::new(cfg, store)?;
    let workflow = &state.workflow;

    match cmd {
        cli::ItemCommands::Pending { variant } => {
            let variant = parse_variant(&variant)?;
            let items = workflow.pending_queue(variant).await?;

            if items.is_empty() {
                println!("No items awaiting approval.");
                return Ok(());
            }

            println!("{:<38} {:<22} CREATED BY", "ID", "SUBMITTED");
            for item in items {
                let submitted = item
                    .submitted_at
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".into());
                println!("{:<38} {:<22} {}", item.id, submitted, item.created_by);
            }
        }
        cli::ItemCommands::Approve {
            variant,
            id,
            actor,
            role,
            notes,
        } => {
            let actor = Actor::new(actor, Role::parse(&role));
            let item = workflow
                .decide(&actor, parse_variant(&variant)?, &id, Status::Active, &notes)
                .await?;
            println!("Item {} approved (status: {}).", item.id, item.status);
        }
        cli::ItemCommands::Reject {
            variant,
            id,
            actor,
            role,
            notes,
        } => {
            let actor = Actor::new(actor, Role::parse(&role));
            let item = workflow
                .decide(&actor, parse_variant(&variant)?, &id, Status::Rejected, &notes)
                .await?;
            println!("Item {} rejected (status: {}).", item.id, item.status);
        }
        cli::ItemCommands::History { variant, id } => {
            let events = workflow.history(parse_variant(&variant)?, &id).await?;
            println!("{:<22} {:<18} {:<18} {:<20} NOTES", "AT", "FROM", "TO", "ACTOR");
            for e in events {
                println!(
                    "{:<22} {:<18} {:<18} {:<20} {}",
                    e.at.format("%Y-%m-%d %H:%M:%S"),
                    e.from.map(|s| s.as_str()).unwrap_or("-"),
                    e.to.as_str(),
                    e.actor_id,
                    e.notes.unwrap_or_default()
                );
            }
        }
    }
    Ok(())
}

fn handle_token_command(cfg: &Config, cmd: cli::TokenCommands) -> anyhow::Result<()> {
    match cmd {
        cli::TokenCommands::Issue {
            user,
            role,
            ttl_hours,
        } => {
            let ttl = ttl_from_hours(ttl_hours).context("invalid --ttl-hours")?;
            let actor = Actor::new(user, Role::parse(&role));
            let provider = JwtAuthProvider::new(&cfg.jwt_secret);
            let token = provider.issue(&actor, ttl)?;
            println!(
                "Token issued:\n  User: {}\n  Role: {}\n  Use:  Authorization: Bearer {}",
                actor.id, actor.role, token
            );
        }
    }
    Ok(())
}
