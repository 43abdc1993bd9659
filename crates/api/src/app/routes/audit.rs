//! Admin-only reads: movement history, balance rows, reconciliation.

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::CredentialContext;

pub fn router() -> Router {
    Router::new()
        .route("/movements", get(list_movements))
        .route("/inventory/balances", get(list_balances))
        .route("/audit/reconcile", get(reconcile))
}

pub async fn list_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CredentialContext>,
    query: Result<Query<dto::MovementQuery>, QueryRejection>,
) -> axum::response::Response {
    if let Err(e) = services.audit.authorize(ctx.credential()) {
        return errors::ledger_error_to_response(e);
    }

    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return errors::query_rejection_to_response(rejection),
    };
    let filter = match query.into_filter() {
        Ok(filter) => filter,
        Err(msg) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
    };

    match services.audit.movements(ctx.credential(), filter).await {
        Ok(records) => Json(records).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list_balances(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CredentialContext>,
) -> axum::response::Response {
    match services.audit.balances(ctx.credential()).await {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn reconcile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CredentialContext>,
) -> axum::response::Response {
    match services.audit.reconcile(ctx.credential()).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
