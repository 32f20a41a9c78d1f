use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

static DATE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").unwrap());

/// Дата запроса в формате YYYY-MM-DD
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    if !DATE_REGEX.is_match(input) {
        return None;
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d").ok()
}

pub fn validate_year(year: i32) -> bool {
    (1970..=2100).contains(&year)
}

pub fn sanitize_string(input: &str) -> String {
    input.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert!(parse_date("2024-06-15").is_some());
        assert!(parse_date(" 2024-06-15 ").is_some());
        assert!(parse_date("2024-13-01").is_none());
        assert!(parse_date("2024-6-15").is_none());
        assert!(parse_date("15.06.2024").is_none());
        assert!(parse_date("").is_none());
    }

    #[test]
    fn test_validate_year() {
        assert!(validate_year(2024));
        assert!(validate_year(1970));
        assert!(validate_year(2100));
        assert!(!validate_year(1969));
        assert!(!validate_year(2101));
        assert!(!validate_year(-5));
    }

    #[test]
    fn test_sanitize_string() {
        assert_eq!(sanitize_string("  Coral Bay  "), "Coral Bay");
    }
}
