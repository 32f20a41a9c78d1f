use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::{AppState, AuthUser};
use crate::models::{
    ApartmentDetailResponse, BookingUserType, PreviousYearsResponse, RenterSummaryResponse,
    SummaryResponse, UserDetailResponse,
};
use crate::services::invoice_service::DEFAULT_PAGE_SIZE;
use crate::services::sources::{DateFilter, TxnFilter};
use crate::services::visibility::ApartmentFilter;
use crate::services::InvoiceService;
use crate::utils::validators;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/summary", get(get_summary))
        .route("/previous-years", get(get_previous_years))
        .route("/apartments/:id", get(get_apartment_invoices))
        .route("/apartments/:id/renter", get(get_renter_summary))
        .route("/users/:id", get(get_user_invoices))
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct SummaryQuery {
    pub village_id: Option<Uuid>,
    pub phase: Option<i32>,
    pub user_type: Option<BookingUserType>,
    pub year: Option<i32>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub search: Option<String>,
    pub include_renter: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct PreviousYearsQuery {
    pub before_year: Option<i32>,
    pub village_id: Option<Uuid>,
    pub phase: Option<i32>,
    pub user_type: Option<BookingUserType>,
    pub search: Option<String>,
    pub include_renter: Option<bool>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct DetailQuery {
    pub year: Option<i32>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub include_renter: Option<bool>,
}

/// Фильтр по датам из параметров запроса. `year` имеет приоритет
/// над диапазоном дат, если переданы оба.
fn parse_date_filter(
    year: Option<i32>,
    date_from: Option<&str>,
    date_to: Option<&str>,
) -> AppResult<DateFilter> {
    if let Some(year) = year {
        if !validators::validate_year(year) {
            return Err(AppError::BadRequest("Неверный год".to_string()));
        }
        return Ok(DateFilter::Year(year));
    }

    let from = date_from
        .map(|s| {
            validators::parse_date(s)
                .ok_or_else(|| AppError::BadRequest("Неверный формат date_from".to_string()))
        })
        .transpose()?;
    let to = date_to
        .map(|s| {
            validators::parse_date(s)
                .ok_or_else(|| AppError::BadRequest("Неверный формат date_to".to_string()))
        })
        .transpose()?;

    if from.is_none() && to.is_none() {
        Ok(DateFilter::None)
    } else {
        Ok(DateFilter::Range { from, to })
    }
}

/// Финансовая сводка по квартирам
#[utoipa::path(
    get,
    path = "/api/v1/invoices/summary",
    tag = "invoices",
    security(("bearer_auth" = [])),
    params(SummaryQuery),
    responses(
        (status = 200, description = "Сводка по квартирам с итогами", body = SummaryResponse),
        (status = 400, description = "Неверные параметры"),
        (status = 401, description = "Не авторизован")
    )
)]
pub async fn get_summary(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<SummaryQuery>,
) -> AppResult<Json<SummaryResponse>> {
    let apartments = ApartmentFilter {
        village_id: query.village_id,
        phase: query.phase,
        user_type: query.user_type,
        search: query.search.as_deref().map(validators::sanitize_string),
    };
    let txn = TxnFilter {
        date: parse_date_filter(query.year, query.date_from.as_deref(), query.date_to.as_deref())?,
        include_renter: query.include_renter.unwrap_or(false),
    };

    let service = InvoiceService::new(state.pool.clone());
    let response = service
        .summary(
            &auth_user,
            &apartments,
            &txn,
            query.page.unwrap_or(1),
            query.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        )
        .await?;

    Ok(Json(response))
}

/// Итоги за прошлые годы
#[utoipa::path(
    get,
    path = "/api/v1/invoices/previous-years",
    tag = "invoices",
    security(("bearer_auth" = [])),
    params(PreviousYearsQuery),
    responses(
        (status = 200, description = "Итоги за все годы до указанного", body = PreviousYearsResponse),
        (status = 400, description = "Неверные параметры"),
        (status = 401, description = "Не авторизован")
    )
)]
pub async fn get_previous_years(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<PreviousYearsQuery>,
) -> AppResult<Json<PreviousYearsResponse>> {
    let before_year = query
        .before_year
        .ok_or_else(|| AppError::BadRequest("before_year обязателен".to_string()))?;
    if !validators::validate_year(before_year) {
        return Err(AppError::BadRequest("Неверный год".to_string()));
    }

    let apartments = ApartmentFilter {
        village_id: query.village_id,
        phase: query.phase,
        user_type: query.user_type,
        search: query.search.as_deref().map(validators::sanitize_string),
    };

    let service = InvoiceService::new(state.pool.clone());
    let response = service
        .previous_years_totals(
            &auth_user,
            &apartments,
            before_year,
            query.include_renter.unwrap_or(false),
        )
        .await?;

    Ok(Json(response))
}

/// Детализация инвойсов по квартире
#[utoipa::path(
    get,
    path = "/api/v1/invoices/apartments/{id}",
    tag = "invoices",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "ID квартиры"),
        DetailQuery
    ),
    responses(
        (status = 200, description = "Транзакции квартиры с итогами", body = ApartmentDetailResponse),
        (status = 401, description = "Не авторизован"),
        (status = 403, description = "Нет доступа к квартире"),
        (status = 404, description = "Квартира не найдена")
    )
)]
pub async fn get_apartment_invoices(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<DetailQuery>,
) -> AppResult<Json<ApartmentDetailResponse>> {
    let txn = TxnFilter {
        date: parse_date_filter(query.year, query.date_from.as_deref(), query.date_to.as_deref())?,
        include_renter: query.include_renter.unwrap_or(false),
    };

    let service = InvoiceService::new(state.pool.clone());
    let response = service.apartment_detail(&auth_user, id, &txn).await?;

    Ok(Json(response))
}

/// Сводка по последнему арендатору квартиры
#[utoipa::path(
    get,
    path = "/api/v1/invoices/apartments/{id}/renter",
    tag = "invoices",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "ID квартиры"),
        DetailQuery
    ),
    responses(
        (status = 200, description = "Сводка по арендатору", body = RenterSummaryResponse),
        (status = 401, description = "Не авторизован"),
        (status = 403, description = "Нет доступа к квартире"),
        (status = 404, description = "Квартира не найдена")
    )
)]
pub async fn get_renter_summary(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<DetailQuery>,
) -> AppResult<Json<RenterSummaryResponse>> {
    let date =
        parse_date_filter(query.year, query.date_from.as_deref(), query.date_to.as_deref())?;

    let service = InvoiceService::new(state.pool.clone());
    let response = service.renter_summary(&auth_user, id, &date).await?;

    Ok(Json(response))
}

/// Детализация инвойсов по пользователю
#[utoipa::path(
    get,
    path = "/api/v1/invoices/users/{id}",
    tag = "invoices",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "ID пользователя"),
        DetailQuery
    ),
    responses(
        (status = 200, description = "Транзакции пользователя с итогами", body = UserDetailResponse),
        (status = 401, description = "Не авторизован"),
        (status = 403, description = "Нет доступа к пользователю"),
        (status = 404, description = "Пользователь не найден")
    )
)]
pub async fn get_user_invoices(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<DetailQuery>,
) -> AppResult<Json<UserDetailResponse>> {
    let txn = TxnFilter {
        date: parse_date_filter(query.year, query.date_from.as_deref(), query.date_to.as_deref())?,
        include_renter: query.include_renter.unwrap_or(false),
    };

    let service = InvoiceService::new(state.pool.clone());
    let response = service.user_detail(&auth_user, id, &txn).await?;

    Ok(Json(response))
}
