use std::sync::Arc;

use axum::{
    extract::Extension,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::CredentialContext;

pub fn router() -> Router {
    Router::new().route("/stats", get(get_stats))
}

pub async fn get_stats(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CredentialContext>,
) -> axum::response::Response {
    match services.dashboard.stats(ctx.credential()).await {
        Ok(stats) => Json(dto::DashboardResponse::from(stats)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
