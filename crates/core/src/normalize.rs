//! Default-value normalization
//!
//! Declared defaults arrive as loose JSON values and must be coerced to the
//! attribute's target type before they are usable. Coercion failures are
//! soft: the default is dropped with a warning and the attribute remains
//! valid, just default-less.

use crate::types::SimpleAttrType;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value;
use tracing::warn;

// ============================================================================
// Constants
// ============================================================================

/// The canonical email pattern used by string attributes across the system
pub const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$";

/// Spellings of the "current time at write" sentinel accepted in defaults
const NOW_SENTINELS: [&str; 3] = ["now", "Date.now", "Date.now()"];

// ============================================================================
// Sentinel & Date Helpers
// ============================================================================

/// Check whether a default value is the `now` sentinel
///
/// The sentinel is stored verbatim; it is the schema compiler that turns it
/// into a compute-at-write-time default.
pub fn is_now_sentinel(value: &Value) -> bool {
    matches!(value, Value::String(s) if NOW_SENTINELS.contains(&s.as_str()))
}

/// Try to interpret a JSON value as a point in time
///
/// Accepts epoch milliseconds, RFC 3339 strings, plain dates
/// (`YYYY-MM-DD`), date-times without offset, and time-of-day strings.
pub fn parse_date_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let millis = n.as_i64()?;
            DateTime::from_timestamp_millis(millis)
        }
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(dt.and_utc());
            }
            if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
            }
            if let Some(time) = parse_time_only(s) {
                let today = Utc::now().date_naive();
                return Some(today.and_time(time).and_utc());
            }
            None
        }
        _ => None,
    }
}

/// Parse a time-of-day string (`HH:MM` or `HH:MM:SS`)
fn parse_time_only(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

// ============================================================================
// Default Coercion
// ============================================================================

/// Coerce a declared default value to its attribute's target type
///
/// Returns the normalized value, or `None` when the default is unusable.
/// An explicit `null` passes through unchanged for every type (a nullable
/// attribute may legitimately default to null). Coercion failures warn and
/// return `None`; defaults are a convenience, not a contract.
pub fn convert_default_value_by_type(
    entity_name: &str,
    attr_name: &str,
    attr_type: SimpleAttrType,
    default: Option<&Value>,
) -> Option<Value> {
    let def = default?;

    if def.is_null() {
        return Some(Value::Null);
    }

    match attr_type {
        SimpleAttrType::Timestamp | SimpleAttrType::Date | SimpleAttrType::Time => {
            if is_now_sentinel(def) {
                return Some(def.clone());
            }
            if parse_date_value(def).is_some() {
                return Some(def.clone());
            }
            warn!(
                "Invalid date default value {} for {}.{}",
                def, entity_name, attr_name
            );
            None
        }

        SimpleAttrType::Number => match def {
            Value::Number(_) => Some(def.clone()),
            Value::String(s) => match s.trim().parse::<f64>() {
                Ok(num) => serde_json::Number::from_f64(num).map(Value::Number),
                Err(_) => {
                    warn!(
                        "Invalid number default value {} for {}.{}",
                        def, entity_name, attr_name
                    );
                    None
                }
            },
            _ => {
                warn!(
                    "Invalid number default value {} for {}.{}",
                    def, entity_name, attr_name
                );
                None
            }
        },

        SimpleAttrType::Boolean => match def {
            Value::Bool(_) => Some(def.clone()),
            Value::String(s) => match s.to_lowercase().as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => {
                    warn!(
                        "Invalid boolean default value {} for {}.{}",
                        def, entity_name, attr_name
                    );
                    None
                }
            },
            Value::Number(n) => {
                let truthy = n.as_f64().map(|f| f != 0.0).unwrap_or(false);
                Some(Value::Bool(truthy))
            }
            _ => {
                warn!(
                    "Invalid boolean default value {} for {}.{}",
                    def, entity_name, attr_name
                );
                None
            }
        },

        _ => Some(def.clone()),
    }
}

// ============================================================================
// Tests
// ============================================================================
