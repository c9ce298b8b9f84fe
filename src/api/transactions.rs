//! Rental endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::transaction::{RentBook, ReturnBook, TransactionView},
};

use super::AuthenticatedUser;

/// Rent a book
#[utoipa::path(
    post,
    path = "/transactions/rent",
    tag = "transactions",
    security(("bearer_auth" = [])),
    request_body = RentBook,
    responses(
        (status = 201, description = "Book rented", body = TransactionView),
        (status = 403, description = "Account blocked or not a member"),
        (status = 409, description = "No copy available"),
        (status = 422, description = "Unpaid fines or book already rented")
    )
)]
pub async fn rent_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<RentBook>,
) -> AppResult<(StatusCode, Json<TransactionView>)> {
    request.validate()?;

    let rental = state.services.rentals.rent(claims.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(rental)))
}

/// Return a rented book
#[utoipa::path(
    post,
    path = "/transactions/return",
    tag = "transactions",
    security(("bearer_auth" = [])),
    request_body = ReturnBook,
    responses(
        (status = 200, description = "Book returned", body = TransactionView),
        (status = 404, description = "No active rental for this book")
    )
)]
pub async fn return_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<ReturnBook>,
) -> AppResult<Json<TransactionView>> {
    let returned = state
        .services
        .rentals
        .return_book(claims.user_id, request.book_id)
        .await?;
    Ok(Json(returned))
}

/// Pay the rental fee
#[utoipa::path(
    post,
    path = "/transactions/{id}/pay",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Transaction ID")
    ),
    responses(
        (status = 200, description = "Rental fee paid", body = TransactionView),
        (status = 404, description = "Transaction not found"),
        (status = 422, description = "Already paid")
    )
)]
pub async fn pay_rental(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<TransactionView>> {
    let paid = state.services.rentals.pay_rental(claims.user_id, id).await?;
    Ok(Json(paid))
}

/// Own rentals with their current fine
#[utoipa::path(
    get,
    path = "/transactions/my",
    tag = "transactions",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Rentals", body = Vec<TransactionView>)
    )
)]
pub async fn my_transactions(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<TransactionView>>> {
    let rentals = state.services.rentals.my_transactions(claims.user_id).await?;
    Ok(Json(rentals))
}

/// Every rental
#[utoipa::path(
    get,
    path = "/transactions",
    tag = "transactions",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Rentals", body = Vec<TransactionView>),
        (status = 403, description = "Administrator only")
    )
)]
pub async fn all_transactions(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<TransactionView>>> {
    claims.require_admin()?;

    let rentals = state.services.rentals.all_transactions().await?;
    Ok(Json(rentals))
}
