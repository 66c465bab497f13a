//! Field values and kind-directed coercion.
//!
//! Spoken observations arrive with locale-specific numerals ("37,8") and
//! several date spellings. Coercion turns a raw capture into the canonical
//! value for its field kind:
//!
//! - `number`: decimal comma rewritten to a decimal point, parsed as `f64`
//! - `date`: `DD.MM.YYYY`, `DD-MM-YYYY` or ISO `YYYY-MM-DD`, emitted as ISO
//! - `text`: trimmed verbatim

use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// Every accepted spelling carries a year. Day-month forms ("05.06") are not
// dates here, and the built-in `date` rule does not capture them either.
const DATE_FORMATS: &[&str] = &["%d.%m.%Y", "%d-%m-%Y", "%Y-%m-%d"];
const ISO_DATE: &str = "%Y-%m-%d";

/// Declared type of a configured field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Text,
    Number,
    Date,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Date => "date",
        }
    }

    /// Coerce a raw capture into a value of this kind.
    ///
    /// Returns `None` when the capture cannot be represented; callers treat
    /// that as "no match" rather than an error.
    pub fn coerce(&self, raw: &str) -> Option<FieldValue> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match self {
            Self::Text => Some(FieldValue::Text(raw.to_string())),
            Self::Number => parse_number(raw).map(FieldValue::Number),
            Self::Date => parse_date(raw).map(|d| FieldValue::Text(d.format(ISO_DATE).to_string())),
        }
    }

    /// Re-coerce an already extracted value, passing it through unchanged
    /// when it cannot be converted.
    pub fn normalize(&self, value: &FieldValue) -> FieldValue {
        match (self, value) {
            (Self::Number | Self::Date, FieldValue::Text(s)) => {
                self.coerce(s).unwrap_or_else(|| value.clone())
            }
            _ => value.clone(),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A final (or candidate) field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Text(s) => Some(s),
        }
    }

    /// Total order used for deterministic tie-breaking: numbers before text,
    /// numbers by IEEE total order, text lexicographically.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Number(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Number(_)) => Ordering::Greater,
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
        }
    }
}

impl fmt::Display for FieldValue {
    /// Whole numbers keep one decimal place ("42.0") so alert messages show
    /// the observed reading the way it was spoken.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{n:.1}")
            }
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Rewrite a decimal comma to a decimal point.
///
/// "37,8" → "37.8", " 850 " → "850"
pub fn normalize_decimal(s: &str) -> String {
    s.trim().replace(',', ".")
}

/// Parse a locale-formatted number. Non-finite results are rejected.
pub fn parse_number(s: &str) -> Option<f64> {
    normalize_decimal(s)
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

/// Parse any of the accepted date spellings.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_comma_rewritten() {
        assert_eq!(normalize_decimal("37,8"), "37.8");
        assert_eq!(normalize_decimal("  850 "), "850");
        assert_eq!(parse_number("37,8"), Some(37.8));
        assert_eq!(parse_number("850"), Some(850.0));
    }

    #[test]
    fn malformed_numbers_rejected() {
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("12,3,4"), None);
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("NaN"), None);
    }

    #[test]
    fn date_spellings() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(parse_date("15.03.2024"), Some(expected));
        assert_eq!(parse_date("15-03-2024"), Some(expected));
        assert_eq!(parse_date("2024-03-15"), Some(expected));
        assert_eq!(parse_date("31.02.2024"), None);
        assert_eq!(parse_date("15.03"), None);
    }

    #[test]
    fn coerce_by_kind() {
        assert_eq!(
            FieldKind::Number.coerce(" 37,8 "),
            Some(FieldValue::Number(37.8))
        );
        assert_eq!(
            FieldKind::Date.coerce("01.06.2023"),
            Some(FieldValue::Text("2023-06-01".into()))
        );
        assert_eq!(
            FieldKind::Text.coerce("  Жужа "),
            Some(FieldValue::Text("Жужа".into()))
        );
        assert_eq!(FieldKind::Text.coerce("   "), None);
        assert_eq!(FieldKind::Number.coerce("много"), None);
    }

    #[test]
    fn normalize_passes_through_on_failure() {
        let v = FieldValue::Text("около сорока".into());
        assert_eq!(FieldKind::Number.normalize(&v), v);
        assert_eq!(
            FieldKind::Number.normalize(&FieldValue::Text("42,5".into())),
            FieldValue::Number(42.5)
        );
        assert_eq!(
            FieldKind::Text.normalize(&FieldValue::Text("42,5".into())),
            FieldValue::Text("42,5".into())
        );
    }

    #[test]
    fn normalize_is_idempotent_for_dates() {
        let once = FieldKind::Date.normalize(&FieldValue::Text("15.03.2024".into()));
        let twice = FieldKind::Date.normalize(&once);
        assert_eq!(once, twice);
        assert_eq!(once, FieldValue::Text("2024-03-15".into()));
    }

    #[test]
    fn display_keeps_one_decimal_for_whole_numbers() {
        assert_eq!(FieldValue::Number(42.0).to_string(), "42.0");
        assert_eq!(FieldValue::Number(37.8).to_string(), "37.8");
        assert_eq!(FieldValue::Text("giraffe".into()).to_string(), "giraffe");
    }

    #[test]
    fn total_order_numbers_before_text() {
        let n = FieldValue::Number(1.0);
        let t = FieldValue::Text("a".into());
        assert_eq!(n.total_cmp(&t), Ordering::Less);
        assert_eq!(t.total_cmp(&n), Ordering::Greater);
        assert_eq!(
            FieldValue::Number(2.0).total_cmp(&FieldValue::Number(10.0)),
            Ordering::Less
        );
    }

    #[test]
    fn values_serialize_untagged() {
        assert_eq!(
            serde_json::to_string(&FieldValue::Number(850.0)).unwrap(),
            "850.0"
        );
        assert_eq!(
            serde_json::to_string(&FieldValue::Text("giraffe".into())).unwrap(),
            "\"giraffe\""
        );
    }
}
