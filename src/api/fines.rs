//! Patron fine endpoints

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    error::AppResult,
    fines::policy::FineConfig,
    models::fine::{
        FineHistory, FineSummary, PayAllResponse, PayFineRequest, PayFineResponse, UserFines,
    },
};

use super::AuthenticatedUser;

/// Own fines, unpaid and paid
#[utoipa::path(
    get,
    path = "/fines",
    tag = "fines",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Fines", body = UserFines)
    )
)]
pub async fn get_my_fines(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<UserFines>> {
    let fines = state.services.fines.user_fines(claims.user_id).await?;
    Ok(Json(fines))
}

/// Fine policy shown to patrons
#[utoipa::path(
    get,
    path = "/fines/config",
    tag = "fines",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Fine policy", body = FineConfig)
    )
)]
pub async fn get_fine_config(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> Json<FineConfig> {
    Json(state.services.fines.config())
}

/// Fine summary
#[utoipa::path(
    get,
    path = "/fines/summary",
    tag = "fines",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Fine summary", body = FineSummary)
    )
)]
pub async fn get_fine_summary(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<FineSummary>> {
    let summary = state.services.fines.summary(claims.user_id).await?;
    Ok(Json(summary))
}

/// Payment history
#[utoipa::path(
    get,
    path = "/fines/history",
    tag = "fines",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Payment history", body = FineHistory)
    )
)]
pub async fn get_fine_history(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<FineHistory>> {
    let history = state.services.fines.history(claims.user_id).await?;
    Ok(Json(history))
}

/// Pay the fine of one rental
#[utoipa::path(
    post,
    path = "/fines/{id}/pay",
    tag = "fines",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Transaction ID")
    ),
    request_body(content = PayFineRequest, description = "Payment method, online by default"),
    responses(
        (status = 200, description = "Fine paid", body = PayFineResponse),
        (status = 404, description = "Transaction not found"),
        (status = 409, description = "Fine already paid"),
        (status = 422, description = "Nothing to pay")
    )
)]
pub async fn pay_fine(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    body: Option<Json<PayFineRequest>>,
) -> AppResult<Json<PayFineResponse>> {
    let method = body.and_then(|Json(b)| b.payment_method);

    let paid = state
        .services
        .fines
        .pay_fine(claims.user_id, id, method)
        .await?;
    Ok(Json(paid))
}

/// Pay every outstanding fine
#[utoipa::path(
    post,
    path = "/fines/pay-all",
    tag = "fines",
    security(("bearer_auth" = [])),
    request_body(content = PayFineRequest, description = "Payment method, online by default"),
    responses(
        (status = 200, description = "Fines paid", body = PayAllResponse),
        (status = 422, description = "No fines to pay")
    )
)]
pub async fn pay_all_fines(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    body: Option<Json<PayFineRequest>>,
) -> AppResult<Json<PayAllResponse>> {
    let method = body.and_then(|Json(b)| b.payment_method);

    let paid = state.services.fines.pay_all(claims.user_id, method).await?;
    Ok(Json(paid))
}
