use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use armory_auth::OperationKind;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::CredentialContext;

pub fn router() -> Router {
    Router::new()
        .route("/purchase", post(purchase))
        .route("/transfer", post(transfer))
        .route("/assign", post(assign))
}

pub async fn purchase(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CredentialContext>,
    body: Result<Json<dto::PurchaseRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(e) = services
        .coordinator
        .authorize_role(ctx.credential(), OperationKind::Purchase)
    {
        return errors::ledger_error_to_response(e);
    }

    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    match services
        .coordinator
        .record_purchase(ctx.credential(), body.into())
        .await
    {
        Ok(receipt) => (
            StatusCode::CREATED,
            Json(dto::MovementAck::new("Asset procured successfully", &receipt)),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CredentialContext>,
    body: Result<Json<dto::TransferRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(e) = services
        .coordinator
        .authorize_role(ctx.credential(), OperationKind::Transfer)
    {
        return errors::ledger_error_to_response(e);
    }

    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    match services
        .coordinator
        .record_transfer(ctx.credential(), body.into())
        .await
    {
        Ok(receipt) => Json(dto::MovementAck::new("Transfer successful", &receipt)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn assign(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CredentialContext>,
    body: Result<Json<dto::AssignRequest>, JsonRejection>,
) -> axum::response::Response {
    // Assignment and Expenditure share one role set; the kind is in the body.
    if let Err(e) = services
        .coordinator
        .authorize_role(ctx.credential(), OperationKind::Assignment)
    {
        return errors::ledger_error_to_response(e);
    }

    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    let cmd = match body.into_command() {
        Ok(cmd) => cmd,
        Err(msg) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
    };

    match services.coordinator.record_assignment(ctx.credential(), cmd).await {
        Ok(receipt) => {
            let message = format!("{} recorded successfully", receipt.movement.kind);
            Json(dto::MovementAck::new(message, &receipt)).into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}
