//! Loan management endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::loan::{BorrowingStats, ClearedFine, Extension, LoanDetails, LoanFilter, ReturnReceipt},
};

use super::AuthenticatedUser;

/// Due date extension request
#[derive(Deserialize, ToSchema)]
pub struct ExtendRequest {
    /// Days to add to the current due date (1 to 30)
    pub days: i64,
}

/// Return a publication borrowed by the caller
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Publication returned", body = ReturnReceipt),
        (status = 404, description = "Loan not found, not yours or already returned", body = crate::error::ErrorResponse),
        (status = 503, description = "Lock contention, retry", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ReturnReceipt>> {
    let receipt = state.services.loans.return_loan(&claims.actor(), id).await?;
    Ok(Json(receipt))
}

/// Loan history of the caller
#[utoipa::path(
    get,
    path = "/loans/mine",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's loans, newest first", body = Vec<LoanDetails>),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn my_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state.services.loans.my_loans(&claims.actor()).await?;
    Ok(Json(loans))
}

/// Most recent loans of every borrower
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(LoanFilter),
    responses(
        (status = 200, description = "Up to 50 loans, newest first", body = Vec<LoanDetails>),
        (status = 403, description = "Caller is not a librarian", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(filter): Query<LoanFilter>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state.services.loans.all_loans(&claims.actor(), &filter).await?;
    Ok(Json(loans))
}

/// Aggregate lending figures
#[utoipa::path(
    get,
    path = "/loans/stats",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Borrowing statistics", body = BorrowingStats),
        (status = 403, description = "Caller is not a librarian", body = crate::error::ErrorResponse)
    )
)]
pub async fn loan_stats(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<BorrowingStats>> {
    let stats = state.services.loans.stats(&claims.actor()).await?;
    Ok(Json(stats))
}

/// Check in a loan on behalf of its borrower
#[utoipa::path(
    post,
    path = "/loans/{id}/manual-return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Publication returned", body = ReturnReceipt),
        (status = 403, description = "Caller is not a librarian", body = crate::error::ErrorResponse),
        (status = 404, description = "Loan not found or already returned", body = crate::error::ErrorResponse),
        (status = 503, description = "Lock contention, retry", body = crate::error::ErrorResponse)
    )
)]
pub async fn manual_return(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ReturnReceipt>> {
    let receipt = state.services.loans.manual_return(&claims.actor(), id).await?;
    Ok(Json(receipt))
}

/// Waive the fine recorded on a loan
#[utoipa::path(
    post,
    path = "/loans/{id}/clear-fine",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Fine cleared", body = ClearedFine),
        (status = 403, description = "Caller is not a librarian", body = crate::error::ErrorResponse),
        (status = 404, description = "Loan not found or has no fine", body = crate::error::ErrorResponse)
    )
)]
pub async fn clear_fine(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ClearedFine>> {
    let cleared = state.services.loans.clear_fine(&claims.actor(), id).await?;
    Ok(Json(cleared))
}

/// Push back the due date of an active loan
#[utoipa::path(
    post,
    path = "/loans/{id}/extend",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    request_body = ExtendRequest,
    responses(
        (status = 200, description = "Due date extended", body = Extension),
        (status = 400, description = "Days out of range", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller is not a librarian", body = crate::error::ErrorResponse),
        (status = 404, description = "Loan not found or already returned", body = crate::error::ErrorResponse)
    )
)]
pub async fn extend_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<ExtendRequest>,
) -> AppResult<Json<Extension>> {
    let extension = state
        .services
        .loans
        .extend_due_date(&claims.actor(), id, request.days)
        .await?;
    Ok(Json(extension))
}
