//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{admin, auth, books, fines, health, transactions, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bookrent API",
        version = "1.0.0",
        description = "Library rental and fine management REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    modifiers(&SecurityAddon),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::register,
        auth::login,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Transactions
        transactions::rent_book,
        transactions::return_book,
        transactions::pay_rental,
        transactions::my_transactions,
        transactions::all_transactions,
        // Users
        users::get_profile,
        users::submit_membership,
        users::membership_status,
        users::list_users,
        // Fines
        fines::get_my_fines,
        fines::get_fine_config,
        fines::get_fine_summary,
        fines::get_fine_history,
        fines::pay_fine,
        fines::pay_all_fines,
        // Admin
        admin::get_stats,
        admin::get_config,
        admin::fine_report,
        admin::run_fine_job,
        admin::return_transaction,
        admin::mark_lost,
        admin::waive_fine,
        admin::mark_fine_paid,
        admin::block_user,
        admin::unblock_user,
    ),
    components(
        schemas(
            // Enums
            crate::models::enums::TransactionStatus,
            crate::models::enums::PaymentStatus,
            crate::models::enums::PaymentMethod,
            crate::models::enums::AccountStatus,
            crate::models::enums::UserRole,
            // Auth and users
            crate::models::user::RegisterUser,
            crate::models::user::LoginRequest,
            crate::models::user::AuthResponse,
            crate::models::user::User,
            crate::models::user::UserShort,
            crate::models::user::MembershipDetails,
            crate::models::user::SubmitMembership,
            crate::models::user::MembershipStatus,
            crate::models::user::BlockAccount,
            crate::models::user::FinePayment,
            // Books
            crate::models::book::Book,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            // Transactions
            crate::models::transaction::Transaction,
            crate::models::transaction::TransactionView,
            crate::models::transaction::RentBook,
            crate::models::transaction::ReturnBook,
            // Fines
            crate::fines::LibraryPolicy,
            crate::fines::policy::FineConfig,
            crate::fines::calculator::FineDetails,
            crate::fines::calculator::BreakdownLine,
            crate::fines::calculator::BreakdownKind,
            crate::fines::calculator::LostItemCharges,
            crate::models::fine::FineEntry,
            crate::models::fine::UserFines,
            crate::models::fine::PayFineRequest,
            crate::models::fine::PayFineResponse,
            crate::models::fine::PaidTransaction,
            crate::models::fine::PayAllResponse,
            crate::models::fine::FineHistory,
            crate::models::fine::FineSummary,
            crate::models::fine::WaiveFineRequest,
            crate::models::fine::WaiveFineResponse,
            crate::models::fine::MarkLostResponse,
            crate::models::fine::ReportFine,
            crate::models::fine::Debtor,
            crate::models::fine::ReportSummary,
            crate::models::fine::FineReport,
            // Admin
            crate::services::stats::DashboardStats,
            crate::services::fine_job::FineJobReport,
            crate::services::fine_job::OverdueSweep,
            crate::services::fine_job::LostSweep,
            crate::services::fine_job::BlockSweep,
            crate::services::fine_job::JobError,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Registration and login"),
        (name = "books", description = "Book catalog"),
        (name = "transactions", description = "Rentals"),
        (name = "users", description = "User accounts and membership"),
        (name = "fines", description = "Patron fines and payments"),
        (name = "admin", description = "Administration")
    )
)]
pub struct ApiDoc;

/// Registers the bearer JWT scheme the secured paths refer to
struct SecurityAddon;

impl Modify for SecurityAddon {
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
    fn test_every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/fines/{id}/pay",
            "/admin/transactions/{id}/waive",
            "/admin/fines/run",
            "/transactions/rent",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
