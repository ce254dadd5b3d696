//! Typed coercion and validation of raw extracted text into a slot's
//! declared type, coded E300-E399.

use chrono::NaiveDate;
use lgdl_ir::SlotDef;
use lgdl_metrics::EngineError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static DURATION_PHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(about\s+)?(\d+|an?)\s*(second|minute|hour|day|week|month|year)s?(\s+ago)?$")
        .unwrap()
});
static FEW_UNIT_PHRASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^a few (second|minute|hour|day|week|month|year)s?$").unwrap());
const TIMEFRAME_CLOSED_PHRASES: &[&str] = &[
    "just now",
    "recently",
    "yesterday",
    "this morning",
    "a while ago",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%d-%m-%Y"];

pub fn coerce(slot_name: &str, def: &SlotDef, raw: &str) -> Result<Value, EngineError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(
            EngineError::new("E300", format!("slot '{slot_name}' has no value to extract"))
                .with_location(format!("slots.{slot_name}")),
        );
    }

    match def {
        SlotDef::String { .. } => Ok(Value::String(raw.to_string())),
        SlotDef::Number { .. } => parse_number(slot_name, raw).map(|n| {
            serde_json::Number::from_f64(n)
                .map(Value::Number)
                .unwrap_or(Value::Null)
        }),
        SlotDef::Range { min, max, .. } => {
            let n = parse_number(slot_name, raw)?;
            if n < *min || n > *max {
                return Err(EngineError::new(
                    "E302",
                    format!("slot '{slot_name}' value {n} is outside range [{min}, {max}]"),
                )
                .with_location(format!("slots.{slot_name}")));
            }
            Ok(serde_json::Number::from_f64(n)
                .map(Value::Number)
                .unwrap_or(Value::Null))
        }
        SlotDef::Enum { values, .. } => {
            // Exact, then case-insensitive exact, then substring containment,
            // each tier checked in full before falling to the next; ties
            // within a tier resolve to the first declared value.
            let matched = values
                .iter()
                .find(|v| v.as_str() == raw)
                .or_else(|| values.iter().find(|v| v.eq_ignore_ascii_case(raw)))
                .or_else(|| {
                    let lower = raw.to_lowercase();
                    values.iter().find(|v| lower.contains(&v.to_lowercase()))
                })
                .cloned()
                .ok_or_else(|| {
                    EngineError::new(
                        "E303",
                        format!(
                            "slot '{slot_name}' value '{raw}' is not one of {values:?}"
                        ),
                    )
                    .with_location(format!("slots.{slot_name}"))
                })?;
            Ok(Value::String(matched))
        }
        SlotDef::Timeframe { .. } => {
            let lower = raw.to_lowercase();
            if DURATION_PHRASE.is_match(&lower)
                || FEW_UNIT_PHRASE.is_match(&lower)
                || TIMEFRAME_CLOSED_PHRASES.contains(&lower.as_str())
            {
                Ok(Value::String(raw.to_string()))
            } else {
                Err(EngineError::new(
                    "E305",
                    format!("slot '{slot_name}' value '{raw}' is not a recognized timeframe"),
                )
                .with_location(format!("slots.{slot_name}")))
            }
        }
        SlotDef::Date { .. } => DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
            .map(|d| Value::String(d.to_string()))
            .ok_or_else(|| {
                EngineError::new(
                    "E304",
                    format!("slot '{slot_name}' value '{raw}' is not a recognized date"),
                )
                .with_location(format!("slots.{slot_name}"))
            }),
    }
}

fn parse_number(slot_name: &str, raw: &str) -> Result<f64, EngineError> {
    raw.parse::<f64>().map_err(|_| {
        EngineError::new("E301", format!("slot '{slot_name}' value '{raw}' is not a number"))
            .with_location(format!("slots.{slot_name}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerces_valid_number() {
        let def = SlotDef::Number {
            required: true,
            default: None,
        };
        assert_eq!(coerce("age", &def, "42").unwrap(), Value::from(42.0));
    }

    #[test]
    fn rejects_non_numeric_input() {
        let def = SlotDef::Number {
            required: true,
            default: None,
        };
        let err = coerce("age", &def, "abc").unwrap_err();
        assert_eq!(err.code, "E301");
    }

    #[test]
    fn rejects_out_of_range_value() {
        let def = SlotDef::Range {
            min: 1.0,
            max: 10.0,
            required: true,
            default: None,
        };
        let err = coerce("severity", &def, "20").unwrap_err();
        assert_eq!(err.code, "E302");
    }

    #[test]
    fn enum_match_is_case_insensitive() {
        let def = SlotDef::Enum {
            values: vec!["Morning".to_string(), "Afternoon".to_string()],
            required: true,
            default: None,
        };
        assert_eq!(coerce("slot", &def, "morning").unwrap(), Value::from("Morning"));
    }

    #[test]
    fn rejects_invalid_enum_choice() {
        let def = SlotDef::Enum {
            values: vec!["Morning".to_string()],
            required: true,
            default: None,
        };
        let err = coerce("slot", &def, "midnight").unwrap_err();
        assert_eq!(err.code, "E303");
    }

    #[test]
    fn enum_matches_by_substring_when_no_exact_match_exists() {
        let def = SlotDef::Enum {
            values: vec!["Morning".to_string(), "Afternoon".to_string()],
            required: true,
            default: None,
        };
        assert_eq!(
            coerce("slot", &def, "I'll take the morning slot").unwrap(),
            Value::from("Morning")
        );
    }

    #[test]
    fn enum_substring_ties_resolve_to_first_declared_value() {
        let def = SlotDef::Enum {
            values: vec!["am".to_string(), "pm".to_string()],
            required: true,
            default: None,
        };
        assert_eq!(coerce("slot", &def, "am or pm works").unwrap(), Value::from("am"));
    }

    #[test]
    fn accepts_duration_timeframe() {
        let def = SlotDef::Timeframe {
            required: true,
            default: None,
        };
        assert_eq!(
            coerce("onset", &def, "1 hour ago").unwrap(),
            Value::String("1 hour ago".to_string())
        );
        assert_eq!(
            coerce("onset", &def, "2 days").unwrap(),
            Value::String("2 days".to_string())
        );
        assert_eq!(
            coerce("onset", &def, "about an hour ago").unwrap(),
            Value::String("about an hour ago".to_string())
        );
    }

    #[test]
    fn accepts_closed_phrase_timeframe() {
        let def = SlotDef::Timeframe {
            required: true,
            default: None,
        };
        assert_eq!(
            coerce("onset", &def, "yesterday").unwrap(),
            Value::String("yesterday".to_string())
        );
    }

    #[test]
    fn accepts_a_few_unit_timeframe() {
        let def = SlotDef::Timeframe {
            required: true,
            default: None,
        };
        assert_eq!(
            coerce("onset", &def, "a few minutes").unwrap(),
            Value::String("a few minutes".to_string())
        );
    }

    #[test]
    fn rejects_unrecognized_timeframe() {
        let def = SlotDef::Timeframe {
            required: true,
            default: None,
        };
        let err = coerce("onset", &def, "sometime possibly").unwrap_err();
        assert_eq!(err.code, "E305");
    }

    #[test]
    fn rejects_malformed_date() {
        let def = SlotDef::Date {
            required: true,
            default: None,
        };
        let err = coerce("dob", &def, "not-a-date").unwrap_err();
        assert_eq!(err.code, "E304");
    }

    #[test]
    fn accepts_us_slash_date() {
        let def = SlotDef::Date {
            required: true,
            default: None,
        };
        assert_eq!(
            coerce("dob", &def, "03/14/2024").unwrap(),
            Value::String("2024-03-14".to_string())
        );
    }

    #[test]
    fn accepts_dashed_day_month_year_date() {
        let def = SlotDef::Date {
            required: true,
            default: None,
        };
        assert_eq!(
            coerce("dob", &def, "14-03-2024").unwrap(),
            Value::String("2024-03-14".to_string())
        );
    }
}
