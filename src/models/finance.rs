use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "currency", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Egp,
    Gbp,
}

/// Кто оплачивает транзакцию. В базе хранится как свободная строка
/// (наследие старых данных), в коде существует только как закрытый enum.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PayerRole {
    Owner,
    Renter,
    Company,
}

impl PayerRole {
    /// Единственная точка нормализации строковых значений `who_pays`/`user_type`.
    /// NULL, пустая строка и нераспознанные значения означают владельца.
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("renter") | Some("tenant") => Self::Renter,
            Some("company") => Self::Company,
            _ => Self::Owner,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Payment {
    pub id: Uuid,
    pub apartment_id: Uuid,
    pub booking_id: Option<Uuid>,
    pub amount: Decimal,
    pub currency: Currency,
    pub date: NaiveDate,
    pub user_type: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ServiceRequest {
    pub id: Uuid,
    pub apartment_id: Uuid,
    pub booking_id: Option<Uuid>,
    pub requester_id: Uuid,
    pub description: Option<String>,
    pub cost: Decimal,
    pub currency: Currency,
    pub who_pays: Option<String>,
    pub date_created: DateTime<Utc>,
    pub date_action: Option<NaiveDate>,
}

/// Показания счётчиков за период. Все четыре показания независимо опциональны:
/// отсутствие начала или конца пары означает нулевое потребление по ней.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UtilityReading {
    pub id: Uuid,
    pub apartment_id: Uuid,
    pub booking_id: Option<Uuid>,
    pub water_start_reading: Option<Decimal>,
    pub water_end_reading: Option<Decimal>,
    pub electricity_start_reading: Option<Decimal>,
    pub electricity_end_reading: Option<Decimal>,
    pub who_pays: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payer_role_defaults_to_owner() {
        assert_eq!(PayerRole::from_raw(None), PayerRole::Owner);
        assert_eq!(PayerRole::from_raw(Some("")), PayerRole::Owner);
        assert_eq!(PayerRole::from_raw(Some("  ")), PayerRole::Owner);
        assert_eq!(PayerRole::from_raw(Some("owner")), PayerRole::Owner);
        assert_eq!(PayerRole::from_raw(Some("что-то")), PayerRole::Owner);
    }

    #[test]
    fn test_payer_role_case_insensitive() {
        assert_eq!(PayerRole::from_raw(Some("Renter")), PayerRole::Renter);
        assert_eq!(PayerRole::from_raw(Some("RENTER")), PayerRole::Renter);
        assert_eq!(PayerRole::from_raw(Some("tenant")), PayerRole::Renter);
        assert_eq!(PayerRole::from_raw(Some(" Company ")), PayerRole::Company);
    }
}
