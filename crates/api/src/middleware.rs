use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::{HeaderMap, Method, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use armory_auth::CredentialVerifier;

use crate::app::errors;
use crate::context::CredentialContext;

#[derive(Clone)]
pub struct AuthState {
    pub verifier: Arc<dyn CredentialVerifier>,
}

/// Resolve the bearer token into a [`CredentialContext`], or answer 401.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let Some(token) = extract_bearer(req.headers()) else {
        return errors::json_error(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "missing bearer credential",
        );
    };

    let credential = match state.verifier.verify(token, Utc::now()) {
        Ok(credential) => credential,
        Err(e) => {
            tracing::debug!(error = %e, "rejected bearer credential");
            return errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", e.to_string());
        }
    };

    let ctx = CredentialContext::new(credential);
    req.extensions_mut().insert(ctx.clone());

    let mut res = next.run(req).await;
    // Lets the audit layer name the caller.
    res.extensions_mut().insert(ctx);
    res
}

/// Emit one `audit` line per state-changing request.
pub async fn audit_middleware(req: axum::http::Request<axum::body::Body>, next: Next) -> Response {
    if req.method() == Method::GET || req.method() == Method::HEAD {
        return next.run(req).await;
    }

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let res = next.run(req).await;

    let caller = res.extensions().get::<CredentialContext>();
    tracing::info!(
        target: "audit",
        method = %method,
        path = %path,
        status = res.status().as_u16(),
        principal_id = caller.map(|c| tracing::field::display(c.principal_id())),
        role = caller.map(|c| c.role().as_str()),
        base_scope = caller.and_then(|c| c.base_scope()).map(|b| b.get()),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request audited"
    );

    res
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let header = header.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}
