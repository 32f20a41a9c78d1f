use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "booking_user_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingUserType {
    Owner,
    Renter,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Booking {
    pub id: Uuid,
    pub apartment_id: Uuid,
    pub user_id: Uuid,
    pub user_type: BookingUserType,
    pub arrival_date: NaiveDate,
    pub leaving_date: NaiveDate,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}
