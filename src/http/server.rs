//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with every route and its permission requirement
//! - Wire up middleware (request ID, tracing, panics, metrics, limits, gatekeeping)
//! - Bind the server to a listener and drain it on shutdown
//! - Own the eviction sweeper's lifetime

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put, MethodRouter};
use axum::Router;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{IdentityResolver, PermCode, Requirement};
use crate::config::ApiConfig;
use crate::http::handlers::{self, companies, health, tokens, users};
use crate::http::middleware::{authenticate, rate_limit, require_permissions, track_metrics};
use crate::http::request::{request_span, UuidRequestId};
use crate::http::response::{ApiError, JsonBody};
use crate::lifecycle::shutdown;
use crate::security::ClientRegistry;
use crate::store::Stores;

/// Application state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub stores: Stores,
    pub registry: Arc<ClientRegistry>,
    pub resolver: IdentityResolver,
}

impl AppState {
    pub fn new(config: ApiConfig, stores: Stores) -> Self {
        let registry = Arc::new(ClientRegistry::from_config(
            &config.rate_limit,
            config.environment,
        ));
        let resolver = IdentityResolver::new(&stores, config.timeouts.store_call());
        Self {
            config: Arc::new(config),
            stores,
            registry,
            resolver,
        }
    }

    /// Per-call storage deadline.
    pub fn deadline(&self) -> Duration {
        self.config.timeouts.store_call()
    }

    /// JSON success body, indented in dev environments.
    pub fn respond(&self, status: StatusCode, body: Value) -> JsonBody {
        JsonBody::new(status, body, self.config.environment.is_dev())
    }

    /// The config-driven admin login only exists in dev environments.
    pub fn admin_login_enabled(&self) -> bool {
        self.config.environment.is_dev()
    }
}

/// HTTP server for the API.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a server backed by a fresh in-memory store.
    pub fn new(config: ApiConfig) -> Self {
        Self::with_stores(config, Stores::in_memory())
    }

    pub fn with_stores(config: ApiConfig, stores: Stores) -> Self {
        let state = AppState::new(config, stores);
        let router = Self::build_router(state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        let config = Arc::clone(&state.config);

        let api = Router::new()
            .route("/health", get(health::health))
            .route("/v1/login", post(tokens::login))
            .route("/v1/users/activate", post(users::activate))
            .route(
                "/v1/users",
                guarded(post(users::create), Requirement::all([PermCode::UsersWrite])),
            )
            .route(
                "/v1/users/{id}",
                record_routes(
                    get(users::read),
                    put(users::replace).patch(users::update).delete(users::delete),
                    PermCode::UsersRead,
                    PermCode::UsersWrite,
                ),
            )
            .route(
                "/v1/companies",
                guarded(
                    post(companies::create),
                    Requirement::all([PermCode::CompaniesWrite]),
                ),
            )
            .route(
                "/v1/companies/{id}",
                record_routes(
                    get(companies::read),
                    put(companies::replace)
                        .patch(companies::update)
                        .delete(companies::delete),
                    PermCode::CompaniesRead,
                    PermCode::CompaniesWrite,
                ),
            )
            .fallback(handlers::route_not_found)
            .method_not_allowed_fallback(handlers::method_not_allowed)
            .with_state(state.clone());

        // Router::layer wraps outward: gatekeeping first, then the body
        // limit on its own (it changes the body type), then the outer stack.
        api.layer(
            ServiceBuilder::new()
                .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
                .layer(from_fn_with_state(state.clone(), rate_limit))
                .layer(from_fn_with_state(state, authenticate)),
        )
        .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(TraceLayer::new_for_http().make_span_with(request_span))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CatchPanicLayer::custom(panic_response))
                .layer(from_fn(track_metrics)),
        )
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            environment = %self.state.config.environment,
            rate_limit = self.state.registry.is_enabled(),
            "HTTP server starting"
        );

        let sweeper = self.state.registry.spawn_sweeper(shutdown.resubscribe());

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::wait_for(shutdown))
            .await?;

        if let Some(handle) = sweeper {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Client sweep task failed");
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }
}

/// Put `route` behind `requirement`.
fn guarded(route: MethodRouter<AppState>, requirement: Requirement) -> MethodRouter<AppState> {
    route.route_layer(from_fn_with_state(requirement, require_permissions))
}

/// Reads need `read`, every other method needs `write`.
fn record_routes(
    reads: MethodRouter<AppState>,
    writes: MethodRouter<AppState>,
    read: PermCode,
    write: PermCode,
) -> MethodRouter<AppState> {
    guarded(reads, Requirement::all([read])).merge(guarded(writes, Requirement::all([write])))
}

/// Panics become a plain 500 and the connection is closed.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "Handler panicked");

    let mut response = ApiError::internal("handler panicked", detail.to_string()).into_response();
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}
