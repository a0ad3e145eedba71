//! Convoy - driver lifecycle management for delivery workforces.

pub mod audit;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod ratelimit;
pub mod schema;
pub mod services;
pub mod store;
pub mod telemetry;
pub mod validation;

use axum::{
    http::StatusCode,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};

use diesel::r2d2::{self, ConnectionManager};
use diesel::PgConnection;
use std::sync::Arc;
use std::time::Duration;

use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use audit::AuditLog;
use auth::{IdentityDirectory, JwtConfig, JwtDirectory};
use mailer::{HttpMailer, LogMailer, Mailer};
use middleware::{
    metrics::metrics_middleware,
    rate_limit::{
        accept_rate_limit_middleware, rate_limit_middleware, RateLimitConfig, RateLimitState,
    },
    request_id::request_id_middleware,
};
use ratelimit::InviteRateLimiter;
use services::{DeprovisionService, InvitationService};
use store::{PgStore, RecordStore};
use telemetry::MetricsState;

pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: Option<DbPool>,
    pub store: Arc<dyn RecordStore>,
    pub directory: Arc<dyn IdentityDirectory>,
    pub invitations: InvitationService,
    pub deprovision: DeprovisionService,
    pub jwt_config: Arc<JwtConfig>,
    pub rate_limit: RateLimitState,
    pub metrics: MetricsState,
}

impl AppState {
    pub fn new(db_pool: DbPool, config: &Config) -> Self {
        let store: Arc<dyn RecordStore> = Arc::new(PgStore::new(db_pool.clone()));

        let jwt_config = JwtConfig::from_env_with_expiry(
            config.jwt.access_token_expiry_secs,
            config.jwt.issuer.clone(),
            config.jwt.audience.clone(),
        );

        let mailer: Arc<dyn Mailer> = match HttpMailer::from_config(&config.mail) {
            Ok(http) => Arc::new(http),
            Err(_) => {
                tracing::warn!("No mail provider configured, falling back to log delivery");
                Arc::new(LogMailer)
            }
        };

        Self::assemble(Some(db_pool), store, mailer, jwt_config, config)
    }

    /// Assembles the state from explicit components. Tests use this with a
    /// `MemoryStore` and a capturing mailer instead of Postgres and HTTP.
    pub fn with_components(
        store: Arc<dyn RecordStore>,
        mailer: Arc<dyn Mailer>,
        jwt_config: JwtConfig,
        config: &Config,
    ) -> Self {
        Self::assemble(None, store, mailer, jwt_config, config)
    }

    fn assemble(
        db_pool: Option<DbPool>,
        store: Arc<dyn RecordStore>,
        mailer: Arc<dyn Mailer>,
        jwt_config: JwtConfig,
        config: &Config,
    ) -> Self {
        let rate_limit = if config.security.rate_limiting_enabled {
            RateLimitState::with_config(
                RateLimitConfig::new(config.security.rate_limit_requests_per_minute, 60),
                RateLimitConfig::strict(),
            )
        } else {
            RateLimitState::disabled()
        };

        let directory: Arc<dyn IdentityDirectory> = Arc::new(JwtDirectory::new(
            store.clone(),
            jwt_config.clone(),
            config.security.credential_hash_cost,
        ));

        let limiter =
            InviteRateLimiter::new(config.invites.max_per_window, config.invites.window_secs);
        let audit = AuditLog::new();

        let invitations = InvitationService::new(
            store.clone(),
            mailer,
            directory.clone(),
            limiter,
            audit.clone(),
            config.invites.clone(),
            config.security.temp_credential_length,
        );

        let deprovision = DeprovisionService::new(store.clone(), directory.clone(), audit);

        let metrics = MetricsState::new(config.telemetry.metrics_enabled);

        Self {
            db_pool,
            store,
            directory,
            invitations,
            deprovision,
            jwt_config: Arc::new(jwt_config),
            rate_limit,
            metrics,
        }
    }
}

pub fn create_router(state: AppState, config: &config::Config) -> Router {
    let cors = build_cors_layer(config);
    let body_limit = RequestBodyLimitLayer::new(config.server.max_body_size);

    #[allow(deprecated)]
    let timeout = TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs));

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let rate_limit_state = state.rate_limit.clone();

    let metrics_state = state.metrics.clone();
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check_simple))
        .route("/health/status", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::ready_check))
        .route("/health/live", get(handlers::health::live_check))
        .route(
            "/metrics",
            get(telemetry::metrics::metrics_handler).with_state(metrics_state),
        )
        .with_state(state.clone());

    // Acceptance is reachable without a token; it gets the stricter limiter.
    let onboarding_routes = Router::new()
        .route(
            "/invitations/accept",
            post(handlers::invitations::accept_invitation),
        )
        .layer(axum_middleware::from_fn(accept_rate_limit_middleware))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/invitations", post(handlers::invitations::create_invitation))
        .route(
            "/invitations/{invitation_id}/cancel",
            post(handlers::invitations::cancel_invitation),
        )
        .route("/drivers", post(handlers::drivers::provision_driver))
        .route(
            "/drivers/{driver_profile_id}",
            delete(handlers::drivers::deprovision_driver),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ))
        .with_state(state.clone());

    let docs_routes = openapi::swagger_router();

    Router::new()
        .merge(docs_routes)
        .merge(public_routes)
        .merge(onboarding_routes)
        .merge(protected_routes)
        .fallback(fallback_handler)
        .layer(axum_middleware::from_fn(metrics_middleware))
        .layer(axum_middleware::from_fn(rate_limit_middleware))
        .layer(axum::Extension(rate_limit_state))
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .layer(timeout)
        .layer(body_limit)
        .layer(cors)
}

async fn fallback_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": "Not found", "code": "NOT_FOUND"})),
    )
}

fn build_cors_layer(config: &config::Config) -> CorsLayer {
    use axum::http::header::HeaderName;
    use axum::http::Method;

    let is_wildcard_origin = config.cors.allowed_origins.contains(&"*".to_string())
        || config.cors.allowed_origins.is_empty();

    let methods: Vec<Method> = config
        .cors
        .allowed_methods
        .iter()
        .filter_map(|m| m.parse().ok())
        .collect();

    let headers: Vec<HeaderName> = config
        .cors
        .allowed_headers
        .iter()
        .filter_map(|h| h.parse().ok())
        .collect();

    if config.cors.allow_credentials && is_wildcard_origin {
        CorsLayer::new()
            .allow_origin(tower_http::cors::AllowOrigin::mirror_request())
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(true)
            .max_age(Duration::from_secs(config.cors.max_age_secs))
    } else if config.cors.allow_credentials {
        let origins: Vec<_> = config
            .cors
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(true)
            .max_age(Duration::from_secs(config.cors.max_age_secs))
    } else {
        let cors = if is_wildcard_origin {
            CorsLayer::new().allow_origin(Any)
        } else {
            let origins: Vec<_> = config
                .cors
                .allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new().allow_origin(origins)
        };

        cors.allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(false)
            .max_age(Duration::from_secs(config.cors.max_age_secs))
    }
}

pub fn create_db_pool(config: &config::Config) -> DbPool {
    let manager = ConnectionManager::<PgConnection>::new(&config.database.url);
    r2d2::Pool::builder()
        .max_size(config.database.max_connections)
        .min_idle(Some(config.database.min_connections))
        .connection_timeout(Duration::from_secs(config.database.connection_timeout_secs))
        .idle_timeout(Some(Duration::from_secs(config.database.idle_timeout_secs)))
        .build(manager)
        .expect("Failed to create database pool")
}

pub fn create_db_pool_with_url(database_url: &str) -> DbPool {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    r2d2::Pool::builder()
        .max_size(10)
        .min_idle(Some(2))
        .connection_timeout(Duration::from_secs(30))
        .idle_timeout(Some(Duration::from_secs(600)))
        .build(manager)
        .expect("Failed to create database pool")
}

pub fn init_tracing(config: &config::Config) {
    telemetry::init_telemetry(config);
}

pub use telemetry::tracing::shutdown_telemetry;

pub use config::Config;
