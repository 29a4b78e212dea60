use crate::error::{AppError, AppResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Unexpected, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type CallId = String;

/// Inclusive calendar-date range of a run. Rendered to the API as
/// `<from>T00:00:00Z` and `<to>T23:59:59Z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> AppResult<Self> {
        if from > to {
            return Err(AppError::Argument(format!(
                "Start date {} is after end date {}",
                from, to
            )));
        }
        Ok(DateRange { from, to })
    }

    pub fn parse(from: &str, to: &str) -> AppResult<Self> {
        let parse_one = |raw: &str| {
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| {
                AppError::Argument(format!("Invalid date '{}' (expected YYYY-MM-DD): {}", raw, e))
            })
        };
        DateRange::new(parse_one(from)?, parse_one(to)?)
    }

    pub fn from_datetime(&self) -> String {
        format!("{}T00:00:00Z", self.from.format("%Y-%m-%d"))
    }

    pub fn to_datetime(&self) -> String {
        format!("{}T23:59:59Z", self.to.format("%Y-%m-%d"))
    }

    /// File-name tag, e.g. `07apr25_to_14apr25`.
    pub fn file_tag(&self) -> String {
        format!(
            "{}_to_{}",
            self.from.format("%d%b%y").to_string().to_lowercase(),
            self.to.format("%d%b%y").to_string().to_lowercase()
        )
    }
}

/// Parses an ISO-8601 timestamp with or without offset and returns its
/// calendar date as written (no conversion to UTC).
pub fn iso_date(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.format("%Y-%m-%d").to_string());
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(ndt.format("%Y-%m-%d").to_string());
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .map(|d| d.format("%Y-%m-%d").to_string())
}

pub fn deserialize_flexible_id<'de, D>(deserializer: D) -> Result<CallId, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_optional_flexible_id(deserializer)?
        .ok_or_else(|| de::Error::custom("missing or empty identifier"))
}

pub fn deserialize_optional_flexible_id<'de, D>(
    deserializer: D,
) -> Result<Option<CallId>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OptionalFlexibleIdVisitor;
    impl<'de> Visitor<'de> for OptionalFlexibleIdVisitor {
        type Value = Option<CallId>;
        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("string or integer identifier")
        }
        #[inline]
        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }
        #[inline]
        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }
        #[inline]
        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.fract() == 0.0 && v.is_finite() {
                Ok(Some(format!("{:.0}", v)))
            } else {
                Err(E::invalid_value(Unexpected::Float(v), &self))
            }
        }
        #[inline]
        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E> {
            let t = v.trim();
            Ok((!t.is_empty()).then(|| t.to_string()))
        }
        #[inline]
        fn visit_none<E>(self) -> Result<Self::Value, E> {
            Ok(None)
        }
        #[inline]
        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(None)
        }
    }
    deserializer.deserialize_any(OptionalFlexibleIdVisitor)
}

pub fn deserialize_flexible_i64_or_zero<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    struct FlexibleI64Visitor;
    impl<'de> Visitor<'de> for FlexibleI64Visitor {
        type Value = i64;
        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("integer, null, or string int")
        }
        #[inline]
        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
            Ok(v)
        }
        #[inline]
        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
            Ok(i64::try_from(v).unwrap_or(i64::MAX))
        }
        #[inline]
        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
            if v.fract() == 0.0 && v >= i64::MIN as f64 && v <= i64::MAX as f64 {
                Ok(v as i64)
            } else {
                Ok(0)
            }
        }
        #[inline]
        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E> {
            Ok(v.trim().parse::<i64>().unwrap_or(0))
        }
        #[inline]
        fn visit_none<E>(self) -> Result<Self::Value, E> {
            Ok(0)
        }
        #[inline]
        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(0)
        }
        #[inline]
        fn visit_bool<E>(self, _v: bool) -> Result<Self::Value, E> {
            Ok(0)
        }
        #[inline]
        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            while map
                .next_entry::<de::IgnoredAny, de::IgnoredAny>()?
                .is_some()
            {}
            Ok(0)
        }
        #[inline]
        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            while seq.next_element::<de::IgnoredAny>()?.is_some() {}
            Ok(0)
        }
    }
    deserializer.deserialize_any(FlexibleI64Visitor)
}

pub fn deserialize_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v: Option<String> = Option::deserialize(deserializer)?;
    Ok(v.filter(|s| !s.trim().is_empty()))
}

pub fn deserialize_null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Holder {
        #[serde(deserialize_with = "deserialize_flexible_id")]
        id: CallId,
        #[serde(default, deserialize_with = "deserialize_flexible_i64_or_zero")]
        count: i64,
    }

    #[test]
    fn numeric_and_string_ids_deserialize_to_the_same_text() {
        let a: Holder = serde_json::from_value(json!({"id": 7782342274025937895u64})).unwrap();
        let b: Holder = serde_json::from_value(json!({"id": "7782342274025937895"})).unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.count, 0);
    }

    #[test]
    fn count_tolerates_strings_and_nulls() {
        let h: Holder = serde_json::from_value(json!({"id": "1", "count": "4"})).unwrap();
        assert_eq!(h.count, 4);
        let h: Holder = serde_json::from_value(json!({"id": "1", "count": null})).unwrap();
        assert_eq!(h.count, 0);
    }

    #[test]
    fn empty_id_is_rejected() {
        assert!(serde_json::from_value::<Holder>(json!({"id": "  "})).is_err());
    }

    #[test]
    fn date_range_renders_day_bounds_and_tag() {
        let range = DateRange::parse("2025-04-07", "2025-04-14").unwrap();
        assert_eq!(range.from_datetime(), "2025-04-07T00:00:00Z");
        assert_eq!(range.to_datetime(), "2025-04-14T23:59:59Z");
        assert_eq!(range.file_tag(), "07apr25_to_14apr25");
    }

    #[test]
    fn reversed_range_is_an_argument_error() {
        let err = DateRange::parse("2025-04-14", "2025-04-07").unwrap_err();
        assert!(matches!(err, AppError::Argument(_)));
    }

    #[test]
    fn iso_date_keeps_the_written_offset_date() {
        assert_eq!(iso_date("2025-04-07T23:30:00-07:00").as_deref(), Some("2025-04-07"));
        assert_eq!(iso_date("2025-04-07T10:00:00Z").as_deref(), Some("2025-04-07"));
        assert_eq!(iso_date("2025-04-07T10:00:00").as_deref(), Some("2025-04-07"));
        assert_eq!(iso_date("yesterday"), None);
    }
}
