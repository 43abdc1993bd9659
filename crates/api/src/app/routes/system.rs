use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::app::dto;
use crate::context::CredentialContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(ctx): Extension<CredentialContext>) -> impl IntoResponse {
    Json(dto::WhoAmIResponse::from(&ctx))
}
