//! Account endpoints
//!
//! - `POST /users` registers an account (no authentication)
//! - `PUT /users` updates the caller's own account (Bearer JWT)

use axum::{extract::State, http::StatusCode, routing::post, Router};
use tracing::debug;

use crate::api::middleware::RequireUser;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::{AccountView, DomainError};
use crate::infrastructure::observability::record_account_operation;
use crate::infrastructure::user::{CreateAccountRequest, UpdateAccountRequest};

pub fn create_users_router() -> Router<AppState> {
    Router::new().route("/users", post(create_account).put(update_account))
}

/// POST /users
pub async fn create_account(
    State(state): State<AppState>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountView>), ApiError> {
    debug!("Creating account");

    let result = state.account_service.create(request).await;
    let view = track("create", result)?;

    Ok((StatusCode::CREATED, Json(view)))
}

/// PUT /users
pub async fn update_account(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    Json(request): Json<UpdateAccountRequest>,
) -> Result<Json<AccountView>, ApiError> {
    debug!(user_id = %user_id, "Updating account");

    let result = state.account_service.update(&user_id, request).await;
    let view = track("update", result)?;

    Ok(Json(view))
}

fn track(
    operation: &'static str,
    result: Result<AccountView, DomainError>,
) -> Result<AccountView, ApiError> {
    match result {
        Ok(view) => {
            record_account_operation(operation, "success");
            Ok(view)
        }
        Err(err) => {
            record_account_operation(operation, err.kind());
            debug!(operation, error = %err, "Account operation rejected");
            Err(ApiError::from(err))
        }
    }
}
