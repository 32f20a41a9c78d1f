use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{ApartmentInfo, Currency, PayerRole, UserPublic};

/// Суммы по каждой валюте отдельно. EGP и GBP никогда не складываются
/// в одно число.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq, ToSchema)]
pub struct CurrencyTotals {
    #[serde(rename = "EGP")]
    pub egp: Decimal,
    #[serde(rename = "GBP")]
    pub gbp: Decimal,
}

/// Итоги по деньгам: потрачено, запрошено и сальдо по каждой валюте
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq, ToSchema)]
pub struct MoneyTotals {
    pub total_money_spent: CurrencyTotals,
    pub total_money_requested: CurrencyTotals,
    pub net_money: CurrencyTotals,
}

/// Строка финансовой сводки по одной квартире
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApartmentSummary {
    pub apartment_id: Uuid,
    pub apartment_name: String,
    pub village_name: String,
    pub owner_name: String,
    pub owner_id: Uuid,
    pub phase: i32,
    pub total_money_spent: CurrencyTotals,
    pub total_money_requested: CurrencyTotals,
    pub net_money: CurrencyTotals,
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SummaryResponse {
    pub summary: Vec<ApartmentSummary>,
    pub totals: MoneyTotals,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PreviousYearsResponse {
    pub before_year: i32,
    pub totals: MoneyTotals,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceLineKind {
    Payment,
    ServiceRequest,
    UtilityReading,
}

impl InvoiceLineKind {
    /// Префикс для виртуального идентификатора строки
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::Payment => "payment",
            Self::ServiceRequest => "service-request",
            Self::UtilityReading => "utility-reading",
        }
    }
}

/// Виртуальная строка инвойса. Никогда не сохраняется в базе,
/// собирается на чтении из трёх источников транзакций.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InvoiceLine {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: InvoiceLineKind,
    pub description: String,
    pub amount: Decimal,
    pub currency: Currency,
    pub date: NaiveDate,
    pub payer_role: PayerRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApartmentDetailResponse {
    pub apartment: ApartmentInfo,
    pub invoices: Vec<InvoiceLine>,
    pub totals: MoneyTotals,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserDetailResponse {
    pub user: UserPublic,
    pub invoices: Vec<InvoiceLine>,
    pub totals: MoneyTotals,
}

/// Данные последнего бронирования арендатора для сводки "кто платит"
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RenterBookingInfo {
    pub booking_id: Uuid,
    pub arrival_date: NaiveDate,
    pub leaving_date: NaiveDate,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RenterSummaryResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking: Option<RenterBookingInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renter_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renter_name: Option<String>,
    pub totals: MoneyTotals,
}
