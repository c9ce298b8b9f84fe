//! User account endpoints

use axum::{extract::State, Json};
use validator::Validate;

use crate::{
    error::AppResult,
    models::user::{MembershipStatus, SubmitMembership, User},
};

use super::AuthenticatedUser;

/// Profile of the logged-in user
#[utoipa::path(
    get,
    path = "/users/profile",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User profile", body = User),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_profile(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<User>> {
    let user = state.services.users.profile(claims.user_id).await?;
    Ok(Json(user))
}

/// Submit the membership form
#[utoipa::path(
    post,
    path = "/users/membership",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = SubmitMembership,
    responses(
        (status = 200, description = "Membership granted", body = User),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn submit_membership(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(form): Json<SubmitMembership>,
) -> AppResult<Json<User>> {
    form.validate()?;

    let user = state
        .services
        .users
        .submit_membership(claims.user_id, form)
        .await?;
    Ok(Json(user))
}

/// Membership status of the logged-in user
#[utoipa::path(
    get,
    path = "/users/membership/status",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Membership status", body = MembershipStatus)
    )
)]
pub async fn membership_status(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<MembershipStatus>> {
    let status = state.services.users.membership_status(claims.user_id).await?;
    Ok(Json(status))
}

/// List every account
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Users", body = Vec<User>),
        (status = 403, description = "Administrator only")
    )
)]
pub async fn list_users(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<User>>> {
    claims.require_admin()?;

    let users = state.services.users.list_users().await?;
    Ok(Json(users))
}
