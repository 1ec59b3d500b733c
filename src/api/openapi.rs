//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{accounts, auth, health, loans, publications};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Campus Library API",
        version = "1.0.0",
        description = "University library borrow/return ledger REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::login,
        auth::me,
        // Accounts
        accounts::register_student,
        accounts::list_students,
        accounts::register_faculty,
        accounts::register_librarian,
        accounts::list_librarians,
        // Publications
        publications::list_publications,
        publications::featured_publications,
        publications::recommended_publications,
        publications::get_publication,
        publications::create_publication,
        publications::update_publication,
        publications::delete_publication,
        // Loans
        publications::borrow_publication,
        loans::return_loan,
        loans::my_loans,
        loans::list_loans,
        loans::loan_stats,
        loans::manual_return,
        loans::clear_fine,
        loans::extend_loan,
    ),
    components(
        schemas(
            // Auth
            auth::LoginRequest,
            auth::LoginResponse,
            // Accounts
            crate::models::user::Account,
            crate::models::user::BorrowerSummary,
            crate::models::user::RegisterStudent,
            crate::models::user::RegisterFaculty,
            crate::models::user::RegisterLibrarian,
            crate::models::Role,
            // Publications
            crate::models::publication::Publication,
            crate::models::publication::CreatePublication,
            crate::models::publication::UpdatePublication,
            crate::models::PublicationType,
            // Loans
            loans::ExtendRequest,
            crate::models::loan::LoanDetails,
            crate::models::loan::PublicationSummary,
            crate::models::loan::ReturnReceipt,
            crate::models::loan::ClearedFine,
            crate::models::loan::Extension,
            crate::models::loan::BorrowingStats,
            crate::models::LoanStatus,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication endpoints"),
        (name = "accounts", description = "Student, faculty and librarian accounts"),
        (name = "publications", description = "Catalog of books and theses"),
        (name = "loans", description = "Borrowing, returns, fines and extensions")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_ledger_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/publications/{id}/borrow",
            "/loans/{id}/return",
            "/loans/mine",
            "/loans",
            "/loans/stats",
            "/loans/{id}/manual-return",
            "/loans/{id}/clear-fine",
            "/loans/{id}/extend",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
        assert!(doc
            .components
            .as_ref()
            .is_some_and(|c| c.security_schemes.contains_key("bearer_auth")));
    }

    #[test]
    fn test_student_accounts_path_lists_and_registers() {
        let doc = ApiDoc::openapi();
        let students = &doc.paths.paths["/accounts/students"];
        assert_eq!(students.operations.len(), 2);
    }
}
