use axum::{
    Json, Router, middleware,
    routing::{get, post, put},
};

use agora_types::api::MessageResponse;

use crate::auth::{self, AppState};
use crate::middleware::require_auth;
use crate::{posts, users, votes};

async fn root() -> Json<MessageResponse> {
    Json(MessageResponse::new("Welcome to agora"))
}

/// Public reads plus the token-gated mutations. CORS and tracing layers are
/// added by the binary.
pub fn build(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(root))
        .route("/users", post(users::register).get(users::list_users))
        .route("/users/{id}", get(users::get_user))
        .route("/login", post(auth::login))
        .route("/posts", get(posts::list_posts))
        .route("/posts/{id}", get(posts::get_post))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/posts", post(posts::create_post))
        .route(
            "/posts/{id}",
            put(posts::update_post).delete(posts::delete_post),
        )
        .route("/votes", post(votes::vote))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}
