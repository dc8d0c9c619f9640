pub mod auth;
pub mod convert;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod password;
pub mod posts;
pub mod router;
pub mod token;
pub mod users;
pub mod votes;

use agora_db::Database;
use tracing::error;

use crate::auth::AppState;
use crate::error::ApiError;

/// Run blocking store work off the async runtime.
pub(crate) async fn blocking<F, T, E>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("blocking task failed: {}", e))
        })?
        .map_err(Into::into)
}
