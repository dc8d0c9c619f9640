use std::sync::Arc;

use axum::extract::State;
use tracing::{info, warn};

use agora_db::Database;
use agora_types::api::{LoginRequest, TokenResponse};

use crate::error::ApiError;
use crate::extract::Json;
use crate::token::TokenService;
use crate::{blocking, password};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenService,
}

/// Same message whether the email or the password is wrong.
fn invalid_credentials() -> ApiError {
    ApiError::Unauthenticated("Invalid credentials".into())
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user_id = blocking(&state, move |db| -> Result<Option<i64>, ApiError> {
        let Some(user) = db.get_user_by_email(&req.email)? else {
            return Ok(None);
        };
        // Argon2 verification is slow, keep it on the blocking pool too
        Ok(password::verify_password(&req.password, &user.password).then_some(user.id))
    })
    .await?;

    let Some(user_id) = user_id else {
        warn!("Rejected login attempt");
        return Err(invalid_credentials());
    };

    let token = state
        .tokens
        .issue(user_id)
        .map_err(|e| ApiError::Internal(e.into()))?;

    info!(user_id, "User logged in");
    Ok(Json(TokenResponse::bearer(token)))
}
