//! Account registration endpoints

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::AppResult,
    models::user::{Account, RegisterFaculty, RegisterLibrarian, RegisterStudent},
};

use super::{AuthenticatedUser, MaybeAuthenticatedUser};

/// Register a student account
#[utoipa::path(
    post,
    path = "/accounts/students",
    tag = "accounts",
    request_body = RegisterStudent,
    responses(
        (status = 201, description = "Student registered", body = Account),
        (status = 400, description = "Invalid registration data", body = crate::error::ErrorResponse),
        (status = 409, description = "Student id or email already registered", body = crate::error::ErrorResponse)
    )
)]
pub async fn register_student(
    State(state): State<crate::AppState>,
    Json(request): Json<RegisterStudent>,
) -> AppResult<(StatusCode, Json<Account>)> {
    let account = state.services.users.register_student(request).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// Register a faculty account
#[utoipa::path(
    post,
    path = "/accounts/faculty",
    tag = "accounts",
    request_body = RegisterFaculty,
    responses(
        (status = 201, description = "Faculty member registered", body = Account),
        (status = 400, description = "Invalid registration data", body = crate::error::ErrorResponse),
        (status = 409, description = "Faculty id or email already registered", body = crate::error::ErrorResponse)
    )
)]
pub async fn register_faculty(
    State(state): State<crate::AppState>,
    Json(request): Json<RegisterFaculty>,
) -> AppResult<(StatusCode, Json<Account>)> {
    let account = state.services.users.register_faculty(request).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// Register a librarian account.
///
/// Open while no librarian exists; afterwards the caller must be a librarian.
#[utoipa::path(
    post,
    path = "/accounts/librarians",
    tag = "accounts",
    security((), ("bearer_auth" = [])),
    request_body = RegisterLibrarian,
    responses(
        (status = 201, description = "Librarian registered", body = Account),
        (status = 400, description = "Invalid registration data", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller is not a librarian", body = crate::error::ErrorResponse),
        (status = 409, description = "Librarian id or email already registered", body = crate::error::ErrorResponse)
    )
)]
pub async fn register_librarian(
    State(state): State<crate::AppState>,
    MaybeAuthenticatedUser(claims): MaybeAuthenticatedUser,
    Json(request): Json<RegisterLibrarian>,
) -> AppResult<(StatusCode, Json<Account>)> {
    let caller = claims.map(|c| c.actor());
    let account = state
        .services
        .users
        .register_librarian(caller.as_ref(), request)
        .await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// List student accounts
#[utoipa::path(
    get,
    path = "/accounts/students",
    tag = "accounts",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Student accounts", body = Vec<Account>),
        (status = 403, description = "Caller is not a librarian", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_students(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Account>>> {
    let students = state.services.users.list_students(&claims.actor()).await?;
    Ok(Json(students))
}

/// List librarian accounts
#[utoipa::path(
    get,
    path = "/accounts/librarians",
    tag = "accounts",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Librarian accounts", body = Vec<Account>),
        (status = 403, description = "Caller is not a librarian", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_librarians(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Account>>> {
    let librarians = state.services.users.list_librarians(&claims.actor()).await?;
    Ok(Json(librarians))
}
