use rust_decimal::Decimal;

use crate::models::UtilityReading;

/// Ёмкость механического счётчика: после 999999 показания
/// начинаются снова с нуля.
pub fn meter_max() -> Decimal {
    Decimal::from(999_999)
}

/// Потребление по паре показаний одного счётчика.
///
/// Если любое из показаний отсутствует, потребление равно нулю.
/// Если конечное показание меньше начального, счётчик прошёл через
/// ноль ровно один раз: `(max - start) + end`.
pub fn usage(start: Option<Decimal>, end: Option<Decimal>) -> Decimal {
    usage_with_max(start, end, meter_max())
}

pub fn usage_with_max(start: Option<Decimal>, end: Option<Decimal>, max: Decimal) -> Decimal {
    let (start, end) = match (start, end) {
        (Some(s), Some(e)) => (s, e),
        _ => return Decimal::ZERO,
    };

    if end >= start {
        end - start
    } else {
        (max - start) + end
    }
}

/// Стоимость показаний: вода + электричество по тарифам деревни.
/// Тарифы заданы в EGP, поэтому результат всегда в EGP.
pub fn reading_cost(
    reading: &UtilityReading,
    water_price: Decimal,
    electricity_price: Decimal,
) -> Decimal {
    let water = usage(reading.water_start_reading, reading.water_end_reading);
    let electricity = usage(
        reading.electricity_start_reading,
        reading.electricity_end_reading,
    );
    water * water_price + electricity * electricity_price
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn dec(value: i64) -> Decimal {
        Decimal::from(value)
    }

    fn reading(
        water: (Option<i64>, Option<i64>),
        electricity: (Option<i64>, Option<i64>),
    ) -> UtilityReading {
        UtilityReading {
            id: Uuid::new_v4(),
            apartment_id: Uuid::new_v4(),
            booking_id: None,
            water_start_reading: water.0.map(Decimal::from),
            water_end_reading: water.1.map(Decimal::from),
            electricity_start_reading: electricity.0.map(Decimal::from),
            electricity_end_reading: electricity.1.map(Decimal::from),
            who_pays: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_usage_missing_readings() {
        assert_eq!(usage(None, None), Decimal::ZERO);
        assert_eq!(usage(Some(dec(100)), None), Decimal::ZERO);
        assert_eq!(usage(None, Some(dec(100))), Decimal::ZERO);
    }

    #[test]
    fn test_usage_normal() {
        assert_eq!(usage(Some(dec(100)), Some(dec(150))), dec(50));
        assert_eq!(usage(Some(dec(100)), Some(dec(100))), Decimal::ZERO);
    }

    #[test]
    fn test_usage_rollover() {
        // 999990 -> 5: (999999 - 999990) + 5 = 14
        assert_eq!(usage(Some(dec(999_990)), Some(dec(5))), dec(14));
        // никогда не отрицательное
        assert!(usage(Some(dec(999_999)), Some(dec(0))) >= Decimal::ZERO);
    }

    #[test]
    fn test_usage_custom_max() {
        assert_eq!(
            usage_with_max(Some(dec(95)), Some(dec(3)), dec(99)),
            dec(7)
        );
    }

    #[test]
    fn test_reading_cost_rollover() {
        // вода 999995 -> 3 при тарифе 1.0: потребление 7, стоимость 7 EGP
        let r = reading((Some(999_995), Some(3)), (None, None));
        assert_eq!(reading_cost(&r, dec(1), dec(2)), dec(7));
    }

    #[test]
    fn test_reading_cost_combined() {
        // вода 50 единиц по 2.0 + электричество 10 единиц по 3.0
        let r = reading((Some(100), Some(150)), (Some(200), Some(210)));
        assert_eq!(reading_cost(&r, dec(2), dec(3)), dec(130));
    }
}
