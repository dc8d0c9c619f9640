use axum::{Extension, extract::State, http::StatusCode};
use serde::Deserialize;
use tracing::info;

use agora_db::models::{PostFields, PostFilter};
use agora_types::api::{PostRequest, PostResponse, PostWithVotesResponse};

use crate::auth::AppState;
use crate::blocking;
use crate::convert::{post_response, post_with_votes_response};
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::middleware::{CurrentUser, ensure_owner};

pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct PostQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub skip: u32,
    /// Substring of the title to filter on.
    #[serde(default)]
    pub search: String,
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

/// Map the request body onto the writable columns, one field at a time.
fn fields(req: &PostRequest) -> PostFields<'_> {
    PostFields {
        title: &req.title,
        content: &req.content,
        published: req.published,
        rating: req.rating,
    }
}

fn not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("Post with id {} not found", id))
}

pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PostQuery>,
) -> Result<Json<Vec<PostWithVotesResponse>>, ApiError> {
    // limit=0 is a valid empty page
    let limit = query.limit.min(MAX_LIMIT);

    let rows = blocking(&state, move |db| {
        db.list_posts(&PostFilter {
            limit,
            skip: query.skip,
            search: &query.search,
        })
    })
    .await?;

    Ok(Json(rows.into_iter().map(post_with_votes_response).collect()))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PostWithVotesResponse>, ApiError> {
    let row = blocking(&state, move |db| db.get_post(id))
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(post_with_votes_response(row)))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(caller): Extension<CurrentUser>,
    Json(req): Json<PostRequest>,
) -> Result<(StatusCode, Json<PostResponse>), ApiError> {
    let owner_id = caller.id;
    let row = blocking(&state, move |db| db.create_post(owner_id, &fields(&req))).await?;

    info!(post_id = row.id, owner_id, "Post created");
    Ok((StatusCode::CREATED, Json(post_response(row))))
}

pub async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(caller): Extension<CurrentUser>,
    Json(req): Json<PostRequest>,
) -> Result<Json<PostResponse>, ApiError> {
    let row = blocking(&state, move |db| -> Result<_, ApiError> {
        let owner_id = db.get_post_owner(id)?.ok_or_else(|| not_found(id))?;
        ensure_owner(&caller, owner_id, "modify")?;
        // Owner guard is repeated in the UPDATE, so a concurrent delete reads as not found
        db.update_post(id, caller.id, &fields(&req))?
            .ok_or_else(|| not_found(id))
    })
    .await?;

    Ok(Json(post_response(row)))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(caller): Extension<CurrentUser>,
) -> Result<StatusCode, ApiError> {
    let caller_id = caller.id;
    blocking(&state, move |db| -> Result<(), ApiError> {
        let owner_id = db.get_post_owner(id)?.ok_or_else(|| not_found(id))?;
        ensure_owner(&caller, owner_id, "delete")?;
        if !db.delete_post(id, caller.id)? {
            return Err(not_found(id));
        }
        Ok(())
    })
    .await?;

    info!(post_id = id, owner_id = caller_id, "Post deleted");
    Ok(StatusCode::NO_CONTENT)
}
