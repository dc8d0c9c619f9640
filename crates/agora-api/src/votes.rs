use axum::{Extension, extract::State, http::StatusCode};

use agora_db::models::{CastOutcome, RetractOutcome};
use agora_types::api::{MessageResponse, VoteRequest};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::extract::Json;
use crate::middleware::CurrentUser;

/// Requested transition for a (user, post) pair.
///
/// `dir == 1` likes the post. Every other accepted value, zero and negatives
/// included, retracts. Anything above 1 is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteDirection {
    Like,
    Unlike,
}

impl TryFrom<i64> for VoteDirection {
    type Error = ApiError;

    fn try_from(dir: i64) -> Result<Self, Self::Error> {
        match dir {
            1 => Ok(Self::Like),
            d if d < 1 => Ok(Self::Unlike),
            d => Err(ApiError::Validation(format!(
                "dir must be less than or equal to 1, got {}",
                d
            ))),
        }
    }
}

pub async fn vote(
    State(state): State<AppState>,
    Extension(caller): Extension<CurrentUser>,
    Json(req): Json<VoteRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let direction = VoteDirection::try_from(req.dir)?;
    let user_id = caller.id;
    let post_id = req.post_id;
    let post_missing = || ApiError::NotFound(format!("Post {} does not exist", post_id));

    let message = match direction {
        VoteDirection::Like => match blocking(&state, move |db| db.cast_vote(user_id, post_id)).await? {
            CastOutcome::Cast => "successfully voted",
            CastOutcome::AlreadyVoted => {
                return Err(ApiError::Conflict(format!(
                    "User {} has already voted on post {}",
                    user_id, post_id
                )));
            }
            CastOutcome::PostMissing => return Err(post_missing()),
        },
        VoteDirection::Unlike => {
            match blocking(&state, move |db| db.retract_vote(user_id, post_id)).await? {
                RetractOutcome::Retracted => "successfully deleted vote",
                RetractOutcome::NotVoted => {
                    return Err(ApiError::NotFound("Vote does not exist".into()));
                }
                RetractOutcome::PostMissing => return Err(post_missing()),
            }
        }
    };

    Ok((StatusCode::CREATED, Json(MessageResponse::new(message))))
}
