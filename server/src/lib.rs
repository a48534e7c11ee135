use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue},
    routing::{get, post},
    Router,
};
use kernel::{CreateResource, ErrorReply, RepairReport, Resource, UpdateResource};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    classify::ServerErrorsFailureClass, limit::RequestBodyLimitLayer,
    set_header::SetResponseHeaderLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::Span;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

pub mod config;
pub mod domain;
pub mod error;
mod handlers;
pub mod mirror;
pub mod name;
pub mod readiness;
pub mod reply;
pub mod service;
pub mod sqlite;

#[cfg(test)] // <-- not needed in integration tests
extern crate rstest;

use crate::config::{Config, ConfigError};
use crate::domain::Storage;
use crate::error::StoreError;
use crate::mirror::FsMirror;
use crate::reply::ContentReply;
use crate::service::ResourceService;
use crate::sqlite::Sqlite;

pub type Service = ResourceService<Sqlite, FsMirror>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Cannot access server directory ({}): {source}", .path.display())]
    RootNotWritable { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database {}: {source}", .path.display())]
    Database { path: PathBuf, source: StoreError },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Shared by every handler: the service and the per-operation time limit.
#[derive(Clone)]
pub struct AppState {
    service: Arc<Service>,
    timeout: Duration,
}

impl AppState {
    #[must_use]
    pub fn new(service: Arc<Service>, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    /// Opens the database described by `config`, creating the schema when
    /// missing, and wires the service around it.
    pub fn open(config: &Config) -> Result<Self, ServerError> {
        let storage = Sqlite::new(&config.database, config.timeout);
        storage
            .new_database()
            .map_err(|source| ServerError::Database {
                path: config.database.clone(),
                source,
            })?;
        let service = ResourceService::new(storage, FsMirror::new(&config.root));
        Ok(Self::new(Arc::new(service), config.timeout))
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::create_resource,
        handlers::list_resources,
        handlers::get_resource,
        handlers::get_resource_content,
        handlers::update_resource,
        handlers::delete_resource,
        handlers::repair,
    ),
    components(
        schemas(Resource, CreateResource, UpdateResource, ErrorReply, RepairReport),
        responses(ContentReply)
    ),
    tags(
        (name = "resources", description = "Euphony protocol resources"),
        (name = "maintenance", description = "Mirror maintenance")
    )
)]
pub struct ApiDoc;

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "server=debug,drywall=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Probes the server root, opens the database, repairs the mirror and serves
/// until a shutdown signal arrives.
pub async fn run(config: Config) -> Result<(), ServerError> {
    init_tracing();

    readiness::probe_writable(&config.root).map_err(|source| ServerError::RootNotWritable {
        path: config.root.clone(),
        source,
    })?;
    tracing::info!("server root {} is writable", config.root.display());

    let state = AppState::open(&config)?;
    tracing::info!("database {} opened", config.database.display());

    let service = Arc::clone(&state.service);
    match tokio::task::spawn_blocking(move || service.repair()).await {
        Ok(Ok(report)) => tracing::info!(
            "startup repair: checked {} rewritten {} failed {}",
            report.checked,
            report.rewritten,
            report.failed
        ),
        Ok(Err(e)) => tracing::error!("startup repair failed: {e}"),
        Err(e) => tracing::error!("startup repair aborted: {e}"),
    }

    let socket = config.socket_addr()?;
    let listener = TcpListener::bind(socket).await?;
    tracing::debug!("listening on {}", listener.local_addr()?);

    let app = create_routes(state.clone(), &config);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state
        .service
        .storage()
        .close()
        .map_err(|source| ServerError::Database {
            path: config.database.clone(),
            source,
        })?;
    tracing::info!("database closed");
    Ok(())
}

pub fn create_routes(state: AppState, config: &Config) -> Router {
    Router::new()
        .route(
            "/resources",
            get(handlers::list_resources).post(handlers::create_resource),
        )
        .route(
            "/resources/:name",
            get(handlers::get_resource)
                .put(handlers::update_resource)
                .delete(handlers::delete_resource),
        )
        .route(
            "/resources/:name/content",
            get(handlers::get_resource_content),
        )
        .route("/repair", post(handlers::repair))
        .route("/api-docs/openapi.json", get(handlers::openapi))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http().on_failure(
                    |error: ServerErrorsFailureClass, _latency: Duration, _span: &Span| {
                        tracing::error!("Server error: {error}");
                    },
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    HeaderName::from_static(kernel::PROTOCOL_HEADER),
                    HeaderValue::from_static(kernel::PROTOCOL_VERSION),
                ))
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
                // innermost: the timeout answers with an empty default body
                .layer(TimeoutLayer::new(config.request_timeout))
                .into_inner(),
        )
        .with_state(state)
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("signal received, starting graceful shutdown");
}
