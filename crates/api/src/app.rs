use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use domain::models::image::ImageUploadPolicy;
use domain::services::{IdentityProvider, InMemoryIdentityProvider, InMemoryStorage, ObjectStorage};
use shared::pagination::{Page, PageParams};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::config::{Config, ProviderKind};
use crate::middleware::{
    metrics_handler, metrics_middleware, rate_limit_middleware, require_user_auth,
    security_headers_middleware, trace_id, RateLimitTier, RateLimiterState,
};
use crate::routes::{albums, auth, events, health, images, openapi, public};
use crate::services::{AccessTokenVerifier, SupabaseAuthClient, SupabaseStorageClient};

/// Headroom for multipart framing around a single cover upload.
const COVER_BODY_HEADROOM: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub rate_limiter: Option<Arc<RateLimiterState>>,
    pub identity: Arc<dyn IdentityProvider>,
    pub storage: Arc<dyn ObjectStorage>,
    pub token_verifier: Arc<AccessTokenVerifier>,
}

impl AppState {
    /// Resolves list paging against the configured limits.
    pub fn page(&self, params: &PageParams) -> Page {
        params.resolve(
            self.config.limits.default_page_size,
            self.config.limits.max_page_size,
        )
    }

    pub fn upload_policy(&self) -> ImageUploadPolicy {
        ImageUploadPolicy::new(
            self.config.limits.max_image_bytes,
            self.config.limits.max_files_per_upload,
        )
    }
}

/// External services behind the API.
#[derive(Clone)]
pub struct Services {
    pub identity: Arc<dyn IdentityProvider>,
    pub storage: Arc<dyn ObjectStorage>,
    pub token_verifier: Arc<AccessTokenVerifier>,
}

impl Services {
    /// Builds the provider clients selected by `provider.kind`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let provider = &config.provider;
        let token_verifier = Arc::new(
            AccessTokenVerifier::new(provider).context("Failed to build token verifier")?,
        );

        let (identity, storage): (Arc<dyn IdentityProvider>, Arc<dyn ObjectStorage>) =
            match provider.kind {
                ProviderKind::Supabase => {
                    let identity = SupabaseAuthClient::new(provider)
                        .context("Failed to build identity provider client")?;
                    let storage = SupabaseStorageClient::new(
                        &provider.url,
                        config.storage_public_base_url(),
                        &config.storage.bucket,
                        &provider.service_role_key,
                        provider.request_timeout_secs,
                    )
                    .context("Failed to build storage client")?;
                    (Arc::new(identity), Arc::new(storage))
                }
                ProviderKind::Memory => {
                    warn!("Using in-memory identity provider and storage; data is not persisted");
                    (
                        Arc::new(InMemoryIdentityProvider::new(
                            provider.jwt_secret.clone(),
                            provider.auto_confirm,
                        )),
                        Arc::new(InMemoryStorage::new(
                            config.storage_public_base_url(),
                            config.storage.bucket.clone(),
                        )),
                    )
                }
            };

        Ok(Self {
            identity,
            storage,
            token_verifier,
        })
    }
}

/// Builds the application with provider clients and rate limiting taken from
/// configuration.
pub async fn create_app(config: Config, pool: PgPool) -> anyhow::Result<Router> {
    let services = Services::from_config(&config)?;

    let rate_limiter = if config.rate_limit.enabled {
        Some(Arc::new(RateLimiterState::connect(&config.rate_limit).await))
    } else {
        info!("Rate limiting disabled");
        None
    };

    Ok(router(state(config, pool, services, rate_limiter)))
}

/// Builds the application around the given services. Rate limiting, when
/// enabled, counts in process.
pub fn create_app_with_services(config: Config, pool: PgPool, services: Services) -> Router {
    let rate_limiter = config
        .rate_limit
        .enabled
        .then(|| Arc::new(RateLimiterState::new(config.rate_limit.tiers)));
    router(state(config, pool, services, rate_limiter))
}

fn state(
    config: Config,
    pool: PgPool,
    services: Services,
    rate_limiter: Option<Arc<RateLimiterState>>,
) -> AppState {
    AppState {
        pool,
        config: Arc::new(config),
        rate_limiter,
        identity: services.identity,
        storage: services.storage,
        token_verifier: services.token_verifier,
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.security.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

fn router(state: AppState) -> Router {
    let config = state.config.clone();
    let gallery_body_limit = state.upload_policy().max_request_bytes();
    let cover_body_limit = config
        .limits
        .max_image_bytes
        .saturating_add(COVER_BODY_HEADROOM);

    // Account routes, each with its own budget per client address.
    let sign_up_routes = Router::new()
        .route("/api/v1/auth/signup", post(auth::sign_up))
        .route_layer(middleware::from_fn_with_state(
            (state.clone(), RateLimitTier::AuthStrict),
            rate_limit_middleware,
        ));
    let sign_in_routes = Router::new()
        .route("/api/v1/auth/signin", post(auth::sign_in))
        .route_layer(middleware::from_fn_with_state(
            (state.clone(), RateLimitTier::AuthMedium),
            rate_limit_middleware,
        ));
    let resend_routes = Router::new()
        .route(
            "/api/v1/auth/resend-verification",
            post(auth::resend_verification),
        )
        .route_layer(middleware::from_fn_with_state(
            (state.clone(), RateLimitTier::Password),
            rate_limit_middleware,
        ));

    // Tenant content routes.
    // Middleware order: auth runs first, then rate limiting keyed by user.
    let protected_routes = Router::new()
        .route(
            "/api/v1/events",
            get(events::list_events).post(events::create_event),
        )
        .route(
            "/api/v1/events/:event_id",
            get(events::get_event)
                .patch(events::update_event)
                .delete(events::delete_event),
        )
        .route(
            "/api/v1/events/:event_id/cover",
            put(events::upload_cover).layer(DefaultBodyLimit::max(cover_body_limit)),
        )
        .route(
            "/api/v1/albums",
            get(albums::list_albums).post(albums::create_album),
        )
        .route(
            "/api/v1/albums/:album_id",
            get(albums::get_album)
                .patch(albums::update_album)
                .delete(albums::delete_album),
        )
        .route(
            "/api/v1/albums/:album_id/images",
            post(albums::upload_images).layer(DefaultBodyLimit::max(gallery_body_limit)),
        )
        .route("/api/v1/images", get(images::list_images))
        .route("/api/v1/images/slug/:slug", get(images::get_image_by_slug))
        .route(
            "/api/v1/images/:image_id",
            axum::routing::delete(images::delete_image),
        )
        .route_layer(middleware::from_fn_with_state(
            (state.clone(), RateLimitTier::Standard),
            rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_user_auth,
        ));

    // Tenant website reads, no token.
    let public_routes = Router::new()
        .route("/api/v1/public/events", get(public::list_events))
        .route("/api/v1/public/events/:slug", get(public::get_event))
        .route("/api/v1/public/albums", get(public::list_albums))
        .route("/api/v1/public/albums/:slug", get(public::get_album))
        .route("/api/v1/public/images", get(public::list_images))
        .route("/api/v1/public/images/:slug", get(public::get_image))
        .route_layer(middleware::from_fn_with_state(
            (state.clone(), RateLimitTier::ReadHeavy),
            rate_limit_middleware,
        ));

    let operational_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    let openapi_routes = Router::new()
        .route("/api/docs", get(openapi::swagger_ui_redirect))
        .route("/api/docs/", get(openapi::swagger_ui))
        .route("/api/docs/*path", get(openapi::swagger_ui))
        .route("/api/docs/openapi.yaml", get(openapi::openapi_spec));

    Router::new()
        .merge(operational_routes)
        .merge(openapi_routes)
        .merge(sign_up_routes)
        .merge(sign_in_routes)
        .merge(resend_routes)
        .merge(protected_routes)
        .merge(public_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(DefaultBodyLimit::max(config.server.max_body_size))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_headers_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors_layer(&config))
        .with_state(state)
}
