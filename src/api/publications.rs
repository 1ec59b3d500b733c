//! Publication (catalog) endpoints, including borrowing

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        loan::LoanDetails,
        publication::{CreatePublication, Publication, PublicationQuery, UpdatePublication},
    },
};

use super::AuthenticatedUser;

/// List the catalog, optionally restricted to one publication type
#[utoipa::path(
    get,
    path = "/publications",
    tag = "publications",
    params(PublicationQuery),
    responses(
        (status = 200, description = "Publications ordered by title", body = Vec<Publication>)
    )
)]
pub async fn list_publications(
    State(state): State<crate::AppState>,
    Query(query): Query<PublicationQuery>,
) -> AppResult<Json<Vec<Publication>>> {
    let publications = state.services.catalog.list(&query).await?;
    Ok(Json(publications))
}

/// Most recently updated books
#[utoipa::path(
    get,
    path = "/publications/featured",
    tag = "publications",
    responses(
        (status = 200, description = "Up to five books", body = Vec<Publication>)
    )
)]
pub async fn featured_publications(State(state): State<crate::AppState>) -> AppResult<Json<Vec<Publication>>> {
    let publications = state.services.catalog.featured().await?;
    Ok(Json(publications))
}

/// Books from the caller's department
#[utoipa::path(
    get,
    path = "/publications/recommended",
    tag = "publications",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Recommended books", body = Vec<Publication>),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn recommended_publications(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Publication>>> {
    let publications = state.services.catalog.recommended(&claims.actor()).await?;
    Ok(Json(publications))
}

/// Get a publication by ID
#[utoipa::path(
    get,
    path = "/publications/{id}",
    tag = "publications",
    params(
        ("id" = i32, Path, description = "Publication ID")
    ),
    responses(
        (status = 200, description = "Publication details", body = Publication),
        (status = 404, description = "Publication not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_publication(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Publication>> {
    let publication = state.services.catalog.get(id).await?;
    Ok(Json(publication))
}

/// Add a publication to the catalog
#[utoipa::path(
    post,
    path = "/publications",
    tag = "publications",
    security(("bearer_auth" = [])),
    request_body = CreatePublication,
    responses(
        (status = 201, description = "Publication created", body = Publication),
        (status = 400, description = "Invalid publication data", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller is not a librarian", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_publication(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(publication): Json<CreatePublication>,
) -> AppResult<(StatusCode, Json<Publication>)> {
    let created = state
        .services
        .catalog
        .create(&claims.actor(), publication)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update a publication
#[utoipa::path(
    put,
    path = "/publications/{id}",
    tag = "publications",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Publication ID")
    ),
    request_body = UpdatePublication,
    responses(
        (status = 200, description = "Publication updated", body = Publication),
        (status = 400, description = "Invalid publication data", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller is not a librarian", body = crate::error::ErrorResponse),
        (status = 404, description = "Publication not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_publication(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(update): Json<UpdatePublication>,
) -> AppResult<Json<Publication>> {
    let updated = state
        .services
        .catalog
        .update(&claims.actor(), id, update)
        .await?;
    Ok(Json(updated))
}

/// Delete a publication that was never lent out
#[utoipa::path(
    delete,
    path = "/publications/{id}",
    tag = "publications",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Publication ID")
    ),
    responses(
        (status = 204, description = "Publication deleted"),
        (status = 403, description = "Caller is not a librarian", body = crate::error::ErrorResponse),
        (status = 404, description = "Publication not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Publication has lending history", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_publication(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.catalog.delete(&claims.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Borrow one copy of a publication
#[utoipa::path(
    post,
    path = "/publications/{id}/borrow",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Publication ID")
    ),
    responses(
        (status = 201, description = "Loan created", body = LoanDetails),
        (status = 403, description = "Librarians cannot borrow", body = crate::error::ErrorResponse),
        (status = 404, description = "Publication not found", body = crate::error::ErrorResponse),
        (status = 409, description = "No copy available, already borrowed or loan limit reached", body = crate::error::ErrorResponse),
        (status = 503, description = "Lock contention, retry", body = crate::error::ErrorResponse)
    )
)]
pub async fn borrow_publication(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<(StatusCode, Json<LoanDetails>)> {
    let loan = state.services.loans.borrow(&claims.actor(), id).await?;
    Ok((StatusCode::CREATED, Json(loan)))
}
