use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Квартира с данными деревни и владельца - читаемое представление
/// для финансовых сводок
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct ApartmentInfo {
    pub id: Uuid,
    pub name: String,
    pub village_id: Uuid,
    pub village_name: String,
    pub phase: i32,
    pub owner_id: Uuid,
    pub owner_name: String,
}
