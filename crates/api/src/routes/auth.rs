//! Authentication routes for register and login.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use sea_orm::SqlErr;
use serde_json::json;
use tracing::{error, info};

use crate::{AppState, error::ApiError};
use pixfeed_core::auth::{hash_password, validate_password, verify_password_or_dummy};
use pixfeed_db::UserRepository;
use pixfeed_shared::AppError;
use pixfeed_shared::auth::{LoginRequest, LoginResponse, RegisterRequest};

/// Creates the auth router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
}

fn internal_error(action: &str) -> Response {
    ApiError(AppError::Internal(format!("An error occurred during {action}"))).into_response()
}

fn invalid_credentials() -> Response {
    ApiError(AppError::Unauthorized("Invalid email or password".to_string())).into_response()
}

fn email_taken() -> Response {
    ApiError(AppError::Conflict(
        "An account with this email already exists".to_string(),
    ))
    .into_response()
}

fn invalid_input(message: impl Into<String>) -> Response {
    ApiError(AppError::Validation(message.into())).into_response()
}

/// POST /auth/login - Authenticate user and return a bearer token.
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> impl IntoResponse {
    let user_repo = UserRepository::new((*state.db).clone());
    let email = payload.email.trim().to_lowercase();

    let user = match user_repo.find_by_email(&email).await {
        Ok(u) => u,
        Err(e) => {
            error!(error = %e, "Database error during login");
            return internal_error("login");
        }
    };

    match verify_password_or_dummy(
        &payload.password,
        user.as_ref().map(|u| u.password_hash.as_str()),
    ) {
        Ok(true) => {}
        Ok(false) => {
            info!(email = %email, "Failed login attempt");
            return invalid_credentials();
        }
        Err(e) => {
            error!(error = %e, "Password verification error");
            return internal_error("login");
        }
    }

    // verified above, so the user exists
    let Some(user) = user else {
        return invalid_credentials();
    };

    if !user.is_active {
        return ApiError(AppError::Unauthorized(
            "This account has been disabled".to_string(),
        ))
        .into_response();
    }

    let access_token = match state
        .jwt_service
        .generate_access_token(user.id, &user.email)
    {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "Failed to generate access token");
            return internal_error("login");
        }
    };

    info!(user_id = %user.id, "User logged in successfully");

    (
        StatusCode::OK,
        Json(LoginResponse::bearer(
            access_token,
            state.jwt_service.access_token_expires_in(),
        )),
    )
        .into_response()
}

/// POST /auth/register - Register a new user.
async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> impl IntoResponse {
    let email = payload.email.trim().to_lowercase();
    if !email.contains('@') {
        return invalid_input("A valid email address is required");
    }
    if let Err(e) = validate_password(&payload.password) {
        return invalid_input(e.to_string());
    }

    let user_repo = UserRepository::new((*state.db).clone());

    match user_repo.email_exists(&email).await {
        Ok(true) => return email_taken(),
        Ok(false) => {}
        Err(e) => {
            error!(error = %e, "Database error checking email");
            return internal_error("registration");
        }
    }

    let password_hash = match hash_password(&payload.password) {
        Ok(h) => h,
        Err(e) => {
            error!(error = %e, "Failed to hash password");
            return internal_error("registration");
        }
    };

    let user = match user_repo.create(&email, &password_hash).await {
        Ok(u) => u,
        // Lost a race with a concurrent registration for the same email.
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            return email_taken();
        }
        Err(e) => {
            error!(error = %e, "Failed to create user");
            return internal_error("registration");
        }
    };

    info!(user_id = %user.id, email = %user.email, "New user registered");

    (
        StatusCode::CREATED,
        Json(json!({
            "user": {
                "id": user.id,
                "email": user.email
            }
        })),
    )
        .into_response()
}
