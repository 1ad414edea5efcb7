use chrono::{NaiveTime, Timelike};

use crate::models::{CategoryFilter, Weekday};
use crate::store::StoreError;

const MAX_CLASS_NAME_LEN: usize = 100;

/// A validated slot, truncated to whole seconds as it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub span_minutes: i64,
}

fn whole_seconds(time: NaiveTime) -> Result<NaiveTime, StoreError> {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), time.second())
        .ok_or_else(|| StoreError::Validation(format!("invalid time {time}")))
}

/// Duration in minutes of a time slot; the slot must end after it starts.
pub fn validate_time_range(
    start: NaiveTime,
    end: NaiveTime,
    claimed_span: Option<i64>,
) -> Result<TimeRange, StoreError> {
    let start = whole_seconds(start)?;
    let end = whole_seconds(end)?;
    if start >= end {
        return Err(StoreError::Validation(format!(
            "start_time {start} must be before end_time {end}"
        )));
    }
    let span = (end - start).num_minutes();
    match claimed_span {
        Some(claimed) if claimed != span => Err(StoreError::Validation(format!(
            "time_span {claimed} does not match the {span} minutes between start_time and end_time"
        ))),
        _ => Ok(TimeRange {
            start,
            end,
            span_minutes: span,
        }),
    }
}

pub fn validate_class_name(name: &str) -> Result<String, StoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StoreError::Validation("class name must not be empty".into()));
    }
    if trimmed.chars().count() > MAX_CLASS_NAME_LEN {
        return Err(StoreError::Validation(format!(
            "class name must be at most {MAX_CLASS_NAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Out-of-range or unparsable days fall back to `today`.
pub fn resolve_weekday(raw: Option<&str>, today: Weekday) -> Weekday {
    raw.and_then(|value| value.parse().ok()).unwrap_or(today)
}

pub fn resolve_category(raw: Option<&str>) -> CategoryFilter {
    raw.and_then(|value| value.parse().ok()).unwrap_or_default()
}
