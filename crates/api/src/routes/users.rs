//! Current-user endpoint.

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use tracing::error;

use crate::{AppState, error::ApiError, middleware::auth::AuthUser};
use pixfeed_db::UserRepository;
use pixfeed_shared::AppError;
use pixfeed_shared::auth::UserInfo;

/// Creates the users router.
pub fn routes() -> Router<AppState> {
    Router::new().route("/users/me", get(me))
}

/// GET /users/me - Profile of the token holder.
async fn me(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    let user_repo = UserRepository::new((*state.db).clone());

    match user_repo.find_by_id(auth.user_id().into_inner()).await {
        Ok(Some(user)) => (
            StatusCode::OK,
            Json(UserInfo {
                id: user.id,
                email: user.email,
                is_active: user.is_active,
                is_verified: user.is_verified,
            }),
        )
            .into_response(),
        Ok(None) => {
            ApiError(AppError::NotFound("User no longer exists".to_string())).into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to load current user");
            ApiError(AppError::Internal("An error occurred".to_string())).into_response()
        }
    }
}
