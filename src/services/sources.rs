use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    Currency, InvoiceLine, InvoiceLineKind, Payment, PayerRole, ServiceRequest, UtilityReading,
};
use crate::services::ledger::CurrencyLedger;
use crate::services::meter;

/// Фильтр по датам: либо точный год, либо включительный диапазон,
/// либо всё до начала года (для сводки прошлых лет).
#[derive(Debug, Clone, Default)]
pub enum DateFilter {
    #[default]
    None,
    Year(i32),
    Range {
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
    Before(i32),
}

impl DateFilter {
    /// Параметры для NULL-guard условий в SQL:
    /// (год, с даты, по дату, строго до даты)
    fn binds(
        &self,
    ) -> (
        Option<i32>,
        Option<NaiveDate>,
        Option<NaiveDate>,
        Option<NaiveDate>,
    ) {
        match *self {
            DateFilter::None => (None, None, None, None),
            DateFilter::Year(year) => (Some(year), None, None, None),
            DateFilter::Range { from, to } => (None, from, to, None),
            DateFilter::Before(year) => (None, None, None, NaiveDate::from_ymd_opt(year, 1, 1)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TxnFilter {
    pub date: DateFilter,
    pub include_renter: bool,
}

impl TxnFilter {
    /// По умолчанию учитываются только транзакции владельца
    /// (включая NULL в `who_pays`/`user_type`).
    fn keeps(&self, payer: PayerRole) -> bool {
        self.include_renter || payer == PayerRole::Owner
    }
}

/// Область выборки транзакций: по списку квартир, по одному бронированию
/// или по создавшему/запросившему пользователю.
#[derive(Debug, Clone, Default)]
pub struct TxnScope {
    apartment_ids: Option<Vec<Uuid>>,
    booking_id: Option<Uuid>,
    user_id: Option<Uuid>,
}

impl TxnScope {
    pub fn apartments(ids: Vec<Uuid>) -> Self {
        Self {
            apartment_ids: Some(ids),
            ..Self::default()
        }
    }

    pub fn apartment(id: Uuid) -> Self {
        Self::apartments(vec![id])
    }

    pub fn booking(id: Uuid) -> Self {
        Self {
            booking_id: Some(id),
            ..Self::default()
        }
    }

    pub fn created_by(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SourceTotalsRow {
    apartment_id: Uuid,
    currency: Currency,
    payer: Option<String>,
    total: Decimal,
}

fn collect_totals(rows: Vec<SourceTotalsRow>, filter: &TxnFilter) -> HashMap<Uuid, CurrencyLedger> {
    let mut totals: HashMap<Uuid, CurrencyLedger> = HashMap::new();
    for row in rows {
        if !filter.keeps(PayerRole::from_raw(row.payer.as_deref())) {
            continue;
        }
        totals
            .entry(row.apartment_id)
            .or_default()
            .add(row.currency, row.total);
    }
    totals
}

/// Суммы платежей по квартирам одним запросом на весь список.
/// Сумма попадает в ту валюту, в которой была внесена.
pub async fn payment_totals(
    pool: &PgPool,
    scope: &TxnScope,
    filter: &TxnFilter,
) -> AppResult<HashMap<Uuid, CurrencyLedger>> {
    let (year, date_from, date_to, before) = filter.date.binds();

    let rows = sqlx::query_as::<_, SourceTotalsRow>(
        r#"
        SELECT p.apartment_id, p.currency, p.user_type AS payer, SUM(p.amount) AS total
        FROM payments p
        WHERE ($1::uuid[] IS NULL OR p.apartment_id = ANY($1))
          AND ($2::uuid IS NULL OR p.booking_id = $2)
          AND ($3::uuid IS NULL OR p.created_by = $3)
          AND ($4::int IS NULL OR EXTRACT(YEAR FROM p.date)::int = $4)
          AND ($5::date IS NULL OR p.date >= $5)
          AND ($6::date IS NULL OR p.date <= $6)
          AND ($7::date IS NULL OR p.date < $7)
        GROUP BY p.apartment_id, p.currency, p.user_type
        "#,
    )
    .bind(&scope.apartment_ids)
    .bind(scope.booking_id)
    .bind(scope.user_id)
    .bind(year)
    .bind(date_from)
    .bind(date_to)
    .bind(before)
    .fetch_all(pool)
    .await?;

    Ok(collect_totals(rows, filter))
}

/// Суммы заявок на обслуживание. Рабочая дата заявки - date_action,
/// если проставлена, иначе date_created.
pub async fn service_request_totals(
    pool: &PgPool,
    scope: &TxnScope,
    filter: &TxnFilter,
) -> AppResult<HashMap<Uuid, CurrencyLedger>> {
    let (year, date_from, date_to, before) = filter.date.binds();

    let rows = sqlx::query_as::<_, SourceTotalsRow>(
        r#"
        SELECT sr.apartment_id, sr.currency, sr.who_pays AS payer, SUM(sr.cost) AS total
        FROM service_requests sr
        WHERE ($1::uuid[] IS NULL OR sr.apartment_id = ANY($1))
          AND ($2::uuid IS NULL OR sr.booking_id = $2)
          AND ($3::uuid IS NULL OR sr.requester_id = $3)
          AND ($4::int IS NULL OR
               EXTRACT(YEAR FROM COALESCE(sr.date_action, sr.date_created::date))::int = $4)
          AND ($5::date IS NULL OR COALESCE(sr.date_action, sr.date_created::date) >= $5)
          AND ($6::date IS NULL OR COALESCE(sr.date_action, sr.date_created::date) <= $6)
          AND ($7::date IS NULL OR COALESCE(sr.date_action, sr.date_created::date) < $7)
        GROUP BY sr.apartment_id, sr.currency, sr.who_pays
        "#,
    )
    .bind(&scope.apartment_ids)
    .bind(scope.booking_id)
    .bind(scope.user_id)
    .bind(year)
    .bind(date_from)
    .bind(date_to)
    .bind(before)
    .fetch_all(pool)
    .await?;

    Ok(collect_totals(rows, filter))
}

/// Показание счётчиков вместе с тарифами своей деревни
#[derive(Debug, sqlx::FromRow)]
struct PricedReading {
    #[sqlx(flatten)]
    reading: UtilityReading,
    water_price: Decimal,
    electricity_price: Decimal,
    person_name: Option<String>,
}

/// Показания счётчиков с тарифами деревни. В области "по пользователю"
/// показание принадлежит пользователю через его бронирование:
/// собственной колонки автора у показаний нет.
async fn fetch_utility_readings(
    pool: &PgPool,
    scope: &TxnScope,
    filter: &TxnFilter,
) -> AppResult<Vec<PricedReading>> {
    let (year, date_from, date_to, before) = filter.date.binds();

    let rows = sqlx::query_as::<_, PricedReading>(
        r#"
        SELECT ur.*, v.water_price, v.electricity_price, bu.name AS person_name
        FROM utility_readings ur
        JOIN apartments a ON a.id = ur.apartment_id
        JOIN villages v ON v.id = a.village_id
        LEFT JOIN bookings b ON b.id = ur.booking_id
        LEFT JOIN users bu ON bu.id = b.user_id
        WHERE ($1::uuid[] IS NULL OR ur.apartment_id = ANY($1))
          AND ($2::uuid IS NULL OR ur.booking_id = $2)
          AND ($3::uuid IS NULL OR ur.booking_id IN (
                SELECT id FROM bookings WHERE user_id = $3))
          AND ($4::int IS NULL OR EXTRACT(YEAR FROM ur.created_at)::int = $4)
          AND ($5::date IS NULL OR ur.created_at::date >= $5)
          AND ($6::date IS NULL OR ur.created_at::date <= $6)
          AND ($7::date IS NULL OR ur.created_at::date < $7)
        ORDER BY ur.created_at DESC
        "#,
    )
    .bind(&scope.apartment_ids)
    .bind(scope.booking_id)
    .bind(scope.user_id)
    .bind(year)
    .bind(date_from)
    .bind(date_to)
    .bind(before)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Стоимость коммунальных услуг по квартирам. Потребление считается
/// по каждой паре показаний с учётом перехода счётчика через ноль.
pub async fn utility_totals(
    pool: &PgPool,
    scope: &TxnScope,
    filter: &TxnFilter,
) -> AppResult<HashMap<Uuid, CurrencyLedger>> {
    let rows = fetch_utility_readings(pool, scope, filter).await?;

    let mut totals: HashMap<Uuid, CurrencyLedger> = HashMap::new();
    for row in rows {
        if !filter.keeps(PayerRole::from_raw(row.reading.who_pays.as_deref())) {
            continue;
        }
        let cost = meter::reading_cost(&row.reading, row.water_price, row.electricity_price);
        totals
            .entry(row.reading.apartment_id)
            .or_default()
            .add(Currency::Egp, cost);
    }
    Ok(totals)
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentLineRow {
    #[sqlx(flatten)]
    payment: Payment,
    person_name: Option<String>,
}

/// Платежи как строки инвойса
pub async fn payment_lines(
    pool: &PgPool,
    scope: &TxnScope,
    filter: &TxnFilter,
) -> AppResult<Vec<InvoiceLine>> {
    let (year, date_from, date_to, before) = filter.date.binds();

    let rows = sqlx::query_as::<_, PaymentLineRow>(
        r#"
        SELECT p.*, u.name AS person_name
        FROM payments p
        LEFT JOIN users u ON u.id = p.created_by
        WHERE ($1::uuid[] IS NULL OR p.apartment_id = ANY($1))
          AND ($2::uuid IS NULL OR p.booking_id = $2)
          AND ($3::uuid IS NULL OR p.created_by = $3)
          AND ($4::int IS NULL OR EXTRACT(YEAR FROM p.date)::int = $4)
          AND ($5::date IS NULL OR p.date >= $5)
          AND ($6::date IS NULL OR p.date <= $6)
          AND ($7::date IS NULL OR p.date < $7)
        ORDER BY p.date DESC
        "#,
    )
    .bind(&scope.apartment_ids)
    .bind(scope.booking_id)
    .bind(scope.user_id)
    .bind(year)
    .bind(date_from)
    .bind(date_to)
    .bind(before)
    .fetch_all(pool)
    .await?;

    let lines = rows
        .into_iter()
        .filter_map(|row| {
            let payer_role = PayerRole::from_raw(row.payment.user_type.as_deref());
            if !filter.keeps(payer_role) {
                return None;
            }
            Some(InvoiceLine {
                id: format!(
                    "{}-{}",
                    InvoiceLineKind::Payment.id_prefix(),
                    row.payment.id
                ),
                kind: InvoiceLineKind::Payment,
                description: "Платёж".to_string(),
                amount: row.payment.amount,
                currency: row.payment.currency,
                date: row.payment.date,
                payer_role,
                booking_id: row.payment.booking_id,
                person_name: row.person_name,
            })
        })
        .collect();

    Ok(lines)
}

#[derive(Debug, sqlx::FromRow)]
struct ServiceRequestLineRow {
    #[sqlx(flatten)]
    request: ServiceRequest,
    person_name: Option<String>,
}

/// Заявки на обслуживание как строки инвойса
pub async fn service_request_lines(
    pool: &PgPool,
    scope: &TxnScope,
    filter: &TxnFilter,
) -> AppResult<Vec<InvoiceLine>> {
    let (year, date_from, date_to, before) = filter.date.binds();

    let rows = sqlx::query_as::<_, ServiceRequestLineRow>(
        r#"
        SELECT sr.*, u.name AS person_name
        FROM service_requests sr
        JOIN users u ON u.id = sr.requester_id
        WHERE ($1::uuid[] IS NULL OR sr.apartment_id = ANY($1))
          AND ($2::uuid IS NULL OR sr.booking_id = $2)
          AND ($3::uuid IS NULL OR sr.requester_id = $3)
          AND ($4::int IS NULL OR
               EXTRACT(YEAR FROM COALESCE(sr.date_action, sr.date_created::date))::int = $4)
          AND ($5::date IS NULL OR COALESCE(sr.date_action, sr.date_created::date) >= $5)
          AND ($6::date IS NULL OR COALESCE(sr.date_action, sr.date_created::date) <= $6)
          AND ($7::date IS NULL OR COALESCE(sr.date_action, sr.date_created::date) < $7)
        ORDER BY COALESCE(sr.date_action, sr.date_created::date) DESC
        "#,
    )
    .bind(&scope.apartment_ids)
    .bind(scope.booking_id)
    .bind(scope.user_id)
    .bind(year)
    .bind(date_from)
    .bind(date_to)
    .bind(before)
    .fetch_all(pool)
    .await?;

    let lines = rows
        .into_iter()
        .filter_map(|row| {
            let payer_role = PayerRole::from_raw(row.request.who_pays.as_deref());
            if !filter.keeps(payer_role) {
                return None;
            }
            // рабочая дата: date_action, если проставлена
            let date = row
                .request
                .date_action
                .unwrap_or_else(|| row.request.date_created.date_naive());
            Some(InvoiceLine {
                id: format!(
                    "{}-{}",
                    InvoiceLineKind::ServiceRequest.id_prefix(),
                    row.request.id
                ),
                kind: InvoiceLineKind::ServiceRequest,
                description: row
                    .request
                    .description
                    .unwrap_or_else(|| "Заявка на обслуживание".to_string()),
                amount: row.request.cost,
                currency: row.request.currency,
                date,
                payer_role,
                booking_id: row.request.booking_id,
                person_name: row.person_name,
            })
        })
        .collect();

    Ok(lines)
}

/// Показания счётчиков как строки инвойса. Стоимость всегда в EGP.
pub async fn utility_lines(
    pool: &PgPool,
    scope: &TxnScope,
    filter: &TxnFilter,
) -> AppResult<Vec<InvoiceLine>> {
    let rows = fetch_utility_readings(pool, scope, filter).await?;

    let lines = rows
        .into_iter()
        .filter_map(|row| {
            let payer_role = PayerRole::from_raw(row.reading.who_pays.as_deref());
            if !filter.keeps(payer_role) {
                return None;
            }
            let reading = &row.reading;
            let water = meter::usage(reading.water_start_reading, reading.water_end_reading);
            let electricity = meter::usage(
                reading.electricity_start_reading,
                reading.electricity_end_reading,
            );
            Some(InvoiceLine {
                id: format!(
                    "{}-{}",
                    InvoiceLineKind::UtilityReading.id_prefix(),
                    reading.id
                ),
                kind: InvoiceLineKind::UtilityReading,
                description: format!(
                    "Показания счётчиков: вода {}, электричество {}",
                    water, electricity
                ),
                amount: meter::reading_cost(reading, row.water_price, row.electricity_price),
                currency: Currency::Egp,
                date: reading.created_at.date_naive(),
                payer_role,
                booking_id: reading.booking_id,
                person_name: row.person_name,
            })
        })
        .collect();

    Ok(lines)
}

/// Сумма по одному арендатору для fallback-сводки "кто платит"
#[derive(Debug, sqlx::FromRow)]
pub struct RenterTotalsRow {
    pub user_id: Uuid,
    pub name: String,
    pub currency: Currency,
    pub total: Decimal,
}

/// Платежи квартиры, сгруппированные по создавшим их арендаторам
pub async fn payment_totals_by_renter(
    pool: &PgPool,
    apartment_id: Uuid,
    date: &DateFilter,
) -> AppResult<Vec<RenterTotalsRow>> {
    let (year, date_from, date_to, before) = date.binds();

    let rows = sqlx::query_as::<_, RenterTotalsRow>(
        r#"
        SELECT p.created_by AS user_id, u.name, p.currency, SUM(p.amount) AS total
        FROM payments p
        JOIN users u ON u.id = p.created_by
        WHERE p.apartment_id = $1
          AND u.role = 'renter'
          AND ($2::int IS NULL OR EXTRACT(YEAR FROM p.date)::int = $2)
          AND ($3::date IS NULL OR p.date >= $3)
          AND ($4::date IS NULL OR p.date <= $4)
          AND ($5::date IS NULL OR p.date < $5)
        GROUP BY p.created_by, u.name, p.currency
        "#,
    )
    .bind(apartment_id)
    .bind(year)
    .bind(date_from)
    .bind(date_to)
    .bind(before)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Заявки квартиры, сгруппированные по запросившим их арендаторам
pub async fn service_request_totals_by_renter(
    pool: &PgPool,
    apartment_id: Uuid,
    date: &DateFilter,
) -> AppResult<Vec<RenterTotalsRow>> {
    let (year, date_from, date_to, before) = date.binds();

    let rows = sqlx::query_as::<_, RenterTotalsRow>(
        r#"
        SELECT sr.requester_id AS user_id, u.name, sr.currency, SUM(sr.cost) AS total
        FROM service_requests sr
        JOIN users u ON u.id = sr.requester_id
        WHERE sr.apartment_id = $1
          AND u.role = 'renter'
          AND ($2::int IS NULL OR
               EXTRACT(YEAR FROM COALESCE(sr.date_action, sr.date_created::date))::int = $2)
          AND ($3::date IS NULL OR COALESCE(sr.date_action, sr.date_created::date) >= $3)
          AND ($4::date IS NULL OR COALESCE(sr.date_action, sr.date_created::date) <= $4)
          AND ($5::date IS NULL OR COALESCE(sr.date_action, sr.date_created::date) < $5)
        GROUP BY sr.requester_id, u.name, sr.currency
        "#,
    )
    .bind(apartment_id)
    .bind(year)
    .bind(date_from)
    .bind(date_to)
    .bind(before)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(value: i64) -> Decimal {
        Decimal::from(value)
    }

    fn totals_row(apartment_id: Uuid, payer: Option<&str>, egp: i64) -> SourceTotalsRow {
        SourceTotalsRow {
            apartment_id,
            currency: Currency::Egp,
            payer: payer.map(|s| s.to_string()),
            total: dec(egp),
        }
    }

    #[test]
    fn test_collect_totals_owner_only_by_default() {
        let apartment_id = Uuid::new_v4();
        let rows = vec![
            totals_row(apartment_id, None, 100),
            totals_row(apartment_id, Some("owner"), 50),
            totals_row(apartment_id, Some("Renter"), 70),
            totals_row(apartment_id, Some("company"), 30),
        ];

        let totals = collect_totals(rows, &TxnFilter::default());
        assert_eq!(totals[&apartment_id].snapshot().egp, dec(150));
    }

    #[test]
    fn test_collect_totals_include_renter_keeps_all() {
        let apartment_id = Uuid::new_v4();
        let rows = vec![
            totals_row(apartment_id, None, 100),
            totals_row(apartment_id, Some("renter"), 70),
            totals_row(apartment_id, Some("company"), 30),
        ];

        let filter = TxnFilter {
            include_renter: true,
            ..TxnFilter::default()
        };
        let totals = collect_totals(rows, &filter);
        assert_eq!(totals[&apartment_id].snapshot().egp, dec(200));
    }

    #[test]
    fn test_date_filter_binds() {
        assert_eq!(DateFilter::None.binds(), (None, None, None, None));
        assert_eq!(DateFilter::Year(2024).binds(), (Some(2024), None, None, None));

        let from: NaiveDate = "2024-01-01".parse().unwrap();
        let to: NaiveDate = "2024-06-30".parse().unwrap();
        assert_eq!(
            DateFilter::Range {
                from: Some(from),
                to: Some(to)
            }
            .binds(),
            (None, Some(from), Some(to), None)
        );

        let jan_first: NaiveDate = "2023-01-01".parse().unwrap();
        assert_eq!(
            DateFilter::Before(2023).binds(),
            (None, None, None, Some(jan_first))
        );
    }
}
