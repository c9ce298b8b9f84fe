//! Administrator endpoints: dashboard, policy, fine management and account blocking

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;

use crate::{
    error::AppResult,
    fines::LibraryPolicy,
    models::{
        fine::{FineReport, MarkLostResponse, PayFineRequest, PayFineResponse, WaiveFineRequest, WaiveFineResponse},
        transaction::TransactionView,
        user::{BlockAccount, User},
    },
    services::{fine_job::FineJobReport, stats::DashboardStats},
};

use super::AuthenticatedUser;

/// Dashboard counters
#[utoipa::path(
    get,
    path = "/admin/stats",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Dashboard statistics", body = DashboardStats),
        (status = 403, description = "Administrator only")
    )
)]
pub async fn get_stats(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<DashboardStats>> {
    claims.require_admin()?;

    let stats = state.services.stats.dashboard().await?;
    Ok(Json(stats))
}

/// Library policy in force
#[utoipa::path(
    get,
    path = "/admin/config",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Library policy", body = LibraryPolicy),
        (status = 403, description = "Administrator only")
    )
)]
pub async fn get_config(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<LibraryPolicy>> {
    claims.require_admin()?;

    Ok(Json(state.services.policy.clone()))
}

/// Fine report across all users
#[utoipa::path(
    get,
    path = "/admin/fines/report",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Fine report", body = FineReport),
        (status = 403, description = "Administrator only")
    )
)]
pub async fn fine_report(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<FineReport>> {
    claims.require_admin()?;

    let report = state.services.fines.report().await?;
    Ok(Json(report))
}

/// Run the fine maintenance job now
#[utoipa::path(
    post,
    path = "/admin/fines/run",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Run report", body = FineJobReport),
        (status = 403, description = "Administrator only")
    )
)]
pub async fn run_fine_job(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<FineJobReport>> {
    claims.require_admin()?;

    tracing::info!(admin_id = claims.user_id, "Fine maintenance run requested");
    let report = state.services.fine_job.run_all(Utc::now()).await?;
    Ok(Json(report))
}

/// Mark a rental returned
#[utoipa::path(
    put,
    path = "/admin/transactions/{id}/return",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Transaction ID")
    ),
    responses(
        (status = 200, description = "Rental returned", body = TransactionView),
        (status = 404, description = "Transaction not found"),
        (status = 422, description = "Already returned or lost")
    )
)]
pub async fn return_transaction(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<TransactionView>> {
    claims.require_admin()?;

    let returned = state.services.rentals.admin_return(id).await?;
    Ok(Json(returned))
}

/// Declare a rental lost
#[utoipa::path(
    put,
    path = "/admin/transactions/{id}/lost",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Transaction ID")
    ),
    responses(
        (status = 200, description = "Rental marked lost", body = MarkLostResponse),
        (status = 404, description = "Transaction not found"),
        (status = 422, description = "Rental is not out")
    )
)]
pub async fn mark_lost(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<MarkLostResponse>> {
    claims.require_admin()?;

    let lost = state.services.fines.mark_lost(id).await?;
    Ok(Json(lost))
}

/// Waive all or part of a fine
#[utoipa::path(
    put,
    path = "/admin/transactions/{id}/waive",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Transaction ID")
    ),
    request_body = WaiveFineRequest,
    responses(
        (status = 200, description = "Fine waived", body = WaiveFineResponse),
        (status = 400, description = "No amount given"),
        (status = 409, description = "Fine already paid"),
        (status = 422, description = "No fine to waive")
    )
)]
pub async fn waive_fine(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<WaiveFineRequest>,
) -> AppResult<Json<WaiveFineResponse>> {
    claims.require_admin()?;

    let waived = state
        .services
        .fines
        .waive(claims.user_id, id, request)
        .await?;
    Ok(Json(waived))
}

/// Record a fine paid at the desk
#[utoipa::path(
    put,
    path = "/admin/transactions/{id}/pay",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Transaction ID")
    ),
    request_body(content = PayFineRequest, description = "Payment method, cash by default"),
    responses(
        (status = 200, description = "Fine marked paid", body = PayFineResponse),
        (status = 409, description = "Fine already paid"),
        (status = 422, description = "Nothing to pay")
    )
)]
pub async fn mark_fine_paid(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    body: Option<Json<PayFineRequest>>,
) -> AppResult<Json<PayFineResponse>> {
    claims.require_admin()?;
    let method = body.and_then(|Json(b)| b.payment_method);

    let paid = state
        .services
        .fines
        .admin_mark_paid(claims.user_id, id, method)
        .await?;
    Ok(Json(paid))
}

/// Block an account
#[utoipa::path(
    put,
    path = "/admin/users/{id}/block",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    request_body(content = BlockAccount, description = "Reason shown to the patron"),
    responses(
        (status = 200, description = "Account blocked", body = User),
        (status = 404, description = "User not found"),
        (status = 422, description = "Administrator or already blocked")
    )
)]
pub async fn block_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    body: Option<Json<BlockAccount>>,
) -> AppResult<Json<User>> {
    claims.require_admin()?;
    let reason = body.and_then(|Json(b)| b.reason);

    let user = state.services.users.block_account(id, reason).await?;
    Ok(Json(user))
}

/// Unblock an account
#[utoipa::path(
    put,
    path = "/admin/users/{id}/unblock",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Account unblocked", body = User),
        (status = 404, description = "User not found"),
        (status = 422, description = "Account is not blocked")
    )
)]
pub async fn unblock_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<User>> {
    claims.require_admin()?;

    let user = state.services.users.unblock_account(id).await?;
    Ok(Json(user))
}
