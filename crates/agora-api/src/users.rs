use axum::{extract::State, http::StatusCode};
use email_address::EmailAddress;
use tracing::info;

use agora_db::models::{CreateUserOutcome, NewUser};
use agora_types::api::{RegisterRequest, UserResponse};

use crate::auth::AppState;
use crate::convert::user_response;
use crate::error::ApiError;
use crate::extract::{Json, Path};
use crate::{blocking, password};

fn validate(req: &RegisterRequest) -> Result<(), ApiError> {
    if !EmailAddress::is_valid(&req.email) {
        return Err(ApiError::Validation(format!(
            "'{}' is not a valid email address",
            req.email
        )));
    }
    if req.name.trim().is_empty() {
        return Err(ApiError::Validation("Name must not be empty".into()));
    }
    if req.password.is_empty() {
        return Err(ApiError::Validation("Password must not be empty".into()));
    }
    Ok(())
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    validate(&req)?;

    let email = req.email.clone();
    let outcome = blocking(&state, move |db| {
        let password_hash = password::hash_password(&req.password)?;
        db.create_user(&NewUser {
            email: &req.email,
            password_hash: &password_hash,
            name: req.name.trim(),
        })
    })
    .await?;

    match outcome {
        CreateUserOutcome::Created(row) => {
            info!(user_id = row.id, "User registered");
            Ok((StatusCode::CREATED, Json(user_response(&row))))
        }
        CreateUserOutcome::EmailTaken => Err(ApiError::Conflict(format!(
            "User with email {} already exists",
            email
        ))),
    }
}

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let rows = blocking(&state, |db| db.list_users()).await?;
    Ok(Json(rows.iter().map(user_response).collect()))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>, ApiError> {
    let row = blocking(&state, move |db| db.get_user_by_id(id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User with id {} not found", id)))?;
    Ok(Json(user_response(&row)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str, name: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            password: password.into(),
            name: name.into(),
        }
    }

    #[test]
    fn accepts_well_formed_registration() {
        assert!(validate(&request("alice@example.com", "Alice", "pw")).is_ok());
    }

    #[test]
    fn rejects_bad_email() {
        for email in ["", "alice", "alice@", "@example.com"] {
            assert!(matches!(
                validate(&request(email, "Alice", "pw")),
                Err(ApiError::Validation(_))
            ));
        }
    }

    #[test]
    fn rejects_blank_name_and_password() {
        assert!(validate(&request("a@example.com", "   ", "pw")).is_err());
        assert!(validate(&request("a@example.com", "Alice", "")).is_err());
    }
}
