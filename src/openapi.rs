use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "SeaBreeze API",
        version = "1.0.0",
        description = "Backend API для SeaBreeze - платформы учёта финансов туристической деревни",
        contact(
            name = "SeaBreeze Team",
            email = "support@seabreeze.app"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    tags(
        (name = "invoices", description = "Финансовые сводки: платежи, заявки, коммунальные услуги")
    ),
    paths(
        // Invoices
        crate::api::invoices::get_summary,
        crate::api::invoices::get_previous_years,
        crate::api::invoices::get_apartment_invoices,
        crate::api::invoices::get_renter_summary,
        crate::api::invoices::get_user_invoices,
    ),
    components(
        schemas(
            // Users
            crate::models::UserPublic,
            crate::models::UserRole,
            // Apartments
            crate::models::ApartmentInfo,
            // Bookings
            crate::models::BookingUserType,
            // Invoices
            crate::models::Currency,
            crate::models::PayerRole,
            crate::models::CurrencyTotals,
            crate::models::MoneyTotals,
            crate::models::ApartmentSummary,
            crate::models::Pagination,
            crate::models::SummaryResponse,
            crate::models::PreviousYearsResponse,
            crate::models::InvoiceLineKind,
            crate::models::InvoiceLine,
            crate::models::ApartmentDetailResponse,
            crate::models::UserDetailResponse,
            crate::models::RenterBookingInfo,
            crate::models::RenterSummaryResponse,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::Http::new(
                        utoipa::openapi::security::HttpAuthScheme::Bearer,
                    ),
                ),
            );
        }
    }
}
