use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;

/// The authenticated caller, resolved from the bearer token to a live user row.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub email: String,
    pub name: String,
}

/// Resolve the bearer token to a user and attach it as a [`CurrentUser`] extension.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(|| {
            warn!("Missing or malformed Authorization header");
            ApiError::invalid_token()
        })?;

    let user_id = state.tokens.verify(token).map_err(|e| {
        warn!("Token rejected: {}", e);
        ApiError::invalid_token()
    })?;

    // A token can outlive the account it was issued for
    let user = blocking(&state, move |db| db.get_user_by_id(user_id))
        .await?
        .ok_or_else(|| {
            warn!(user_id, "Token subject no longer exists");
            ApiError::invalid_token()
        })?;

    req.extensions_mut().insert(CurrentUser {
        id: user.id,
        email: user.email,
        name: user.name,
    });
    Ok(next.run(req).await)
}

/// Token part of an `Authorization` value. The scheme is matched case-insensitively.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Existence must already be established: this only distinguishes owner from non-owner.
pub fn ensure_owner(caller: &CurrentUser, owner_id: i64, action: &str) -> Result<(), ApiError> {
    if caller.id != owner_id {
        return Err(ApiError::Forbidden(format!(
            "Not authorized to {} another user's post",
            action
        )));
    }
    Ok(())
}
