use axum::{routing::get, Router};

pub mod assets;
pub mod audit;
pub mod dashboard;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/assets", assets::router())
        .nest("/dashboard", dashboard::router())
        .merge(audit::router())
}
