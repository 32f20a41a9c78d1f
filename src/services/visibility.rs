use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{ApartmentInfo, BookingUserType, User, UserRole};

/// Фильтры области видимости по квартирам. Применяются поверх ролевых
/// ограничений, никогда вместо них.
#[derive(Debug, Clone, Default)]
pub struct ApartmentFilter {
    pub village_id: Option<Uuid>,
    pub phase: Option<i32>,
    pub user_type: Option<BookingUserType>,
    pub search: Option<String>,
}

/// Ограничения, вытекающие из роли запрашивающего:
/// владелец видит свои квартиры, арендатор - квартиры со своими
/// бронированиями, админ с закреплённой деревней - только её.
fn role_scope(auth: &AuthUser) -> (Option<Uuid>, Option<Uuid>, Option<Uuid>) {
    match auth.role {
        UserRole::Owner => (Some(auth.user_id), None, None),
        UserRole::Renter => (None, Some(auth.user_id), None),
        UserRole::Admin => (None, None, auth.responsible_village),
        UserRole::SuperAdmin => (None, None, None),
    }
}

/// Полный отфильтрованный список видимых квартир с данными деревни
/// и владельца, в стабильном порядке.
pub async fn visible_apartments(
    pool: &PgPool,
    auth: &AuthUser,
    filter: &ApartmentFilter,
) -> AppResult<Vec<ApartmentInfo>> {
    let (owner_scope, renter_scope, village_scope) = role_scope(auth);
    let search = filter.search.as_ref().map(|s| format!("%{}%", s));

    let apartments = sqlx::query_as::<_, ApartmentInfo>(
        r#"
        SELECT a.id, a.name, a.village_id, v.name AS village_name,
               a.phase, a.owner_id, u.name AS owner_name
        FROM apartments a
        JOIN villages v ON v.id = a.village_id
        JOIN users u ON u.id = a.owner_id
        WHERE ($1::uuid IS NULL OR a.owner_id = $1)
          AND ($2::uuid IS NULL OR EXISTS (
                SELECT 1 FROM bookings b
                WHERE b.apartment_id = a.id AND b.user_id = $2))
          AND ($3::uuid IS NULL OR a.village_id = $3)
          AND ($4::uuid IS NULL OR a.village_id = $4)
          AND ($5::int IS NULL OR a.phase = $5)
          AND ($6::booking_user_type IS NULL OR EXISTS (
                SELECT 1 FROM bookings b
                WHERE b.apartment_id = a.id AND b.user_type = $6))
          AND ($7::varchar IS NULL
               OR a.name ILIKE $7 OR u.name ILIKE $7 OR v.name ILIKE $7)
        ORDER BY v.name, a.name, a.id
        "#,
    )
    .bind(owner_scope)
    .bind(renter_scope)
    .bind(village_scope)
    .bind(filter.village_id)
    .bind(filter.phase)
    .bind(filter.user_type)
    .bind(&search)
    .fetch_all(pool)
    .await?;

    Ok(apartments)
}

/// Квартира по ID: сначала проверка существования, затем прав доступа.
/// Недоступная квартира - это Forbidden, а не пустой результат.
pub async fn require_apartment(
    pool: &PgPool,
    auth: &AuthUser,
    apartment_id: Uuid,
) -> AppResult<ApartmentInfo> {
    let apartment = sqlx::query_as::<_, ApartmentInfo>(
        r#"
        SELECT a.id, a.name, a.village_id, v.name AS village_name,
               a.phase, a.owner_id, u.name AS owner_name
        FROM apartments a
        JOIN villages v ON v.id = a.village_id
        JOIN users u ON u.id = a.owner_id
        WHERE a.id = $1
        "#,
    )
    .bind(apartment_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Квартира не найдена".to_string()))?;

    match auth.role {
        UserRole::SuperAdmin => {}
        UserRole::Admin => {
            if let Some(village_id) = auth.responsible_village {
                if apartment.village_id != village_id {
                    return Err(AppError::Forbidden);
                }
            }
        }
        UserRole::Owner => {
            if apartment.owner_id != auth.user_id {
                return Err(AppError::Forbidden);
            }
        }
        UserRole::Renter => {
            let booked: Option<(i32,)> = sqlx::query_as(
                "SELECT 1 FROM bookings WHERE apartment_id = $1 AND user_id = $2 LIMIT 1",
            )
            .bind(apartment_id)
            .bind(auth.user_id)
            .fetch_optional(pool)
            .await?;

            if booked.is_none() {
                return Err(AppError::Forbidden);
            }
        }
    }

    Ok(apartment)
}

/// Пользователь по ID с той же дисциплиной: существование, затем права.
/// Владельцы и арендаторы видят только себя; админ с закреплённой
/// деревней - только пользователей, связанных с её квартирами.
pub async fn require_user(pool: &PgPool, auth: &AuthUser, user_id: Uuid) -> AppResult<User> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Пользователь не найден".to_string()))?;

    if user.id == auth.user_id {
        return Ok(user);
    }

    match auth.role {
        UserRole::SuperAdmin => {}
        UserRole::Admin => {
            if let Some(village_id) = auth.responsible_village {
                let linked: Option<(i32,)> = sqlx::query_as(
                    r#"
                    SELECT 1 FROM apartments a
                    WHERE a.village_id = $1
                      AND (a.owner_id = $2 OR EXISTS (
                            SELECT 1 FROM bookings b
                            WHERE b.apartment_id = a.id AND b.user_id = $2))
                    LIMIT 1
                    "#,
                )
                .bind(village_id)
                .bind(user_id)
                .fetch_optional(pool)
                .await?;

                if linked.is_none() {
                    return Err(AppError::Forbidden);
                }
            }
        }
        UserRole::Owner | UserRole::Renter => return Err(AppError::Forbidden),
    }

    Ok(user)
}
