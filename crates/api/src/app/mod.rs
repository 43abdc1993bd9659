//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: infrastructure wiring (store, gate, coordinator, readers)
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use armory_auth::{CredentialVerifier, Hs256CredentialVerifier};

use crate::config::{AppConfig, ConfigError};
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to initialize the ledger store: {0}")]
    Store(#[from] armory_infra::StoreError),
}

/// Build the full HTTP router from configuration (entrypoint used by `main.rs`).
pub async fn build_app(config: &AppConfig) -> Result<Router, BuildError> {
    let seed = config.load_catalog()?;
    let services = services::build_services(&config.backend, seed.as_ref(), config.stock_policy).await?;
    let verifier = Arc::new(Hs256CredentialVerifier::new(config.jwt_secret.as_bytes()));

    Ok(build_router(Arc::new(services), verifier))
}

/// Assemble the router around already-built services.
pub fn build_router(services: Arc<services::AppServices>, verifier: Arc<dyn CredentialVerifier>) -> Router {
    let auth_state = middleware::AuthState { verifier };

    // Protected routes: require a verified credential.
    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected.clone())
        .nest("/api", protected)
        .layer(ServiceBuilder::new().layer(axum::middleware::from_fn(middleware::audit_middleware)))
}
