use chrono::{Duration, NaiveDate};
use icalendar::{Calendar, Component, Event, EventLike};

use crate::models::ScheduleEntry;

#[derive(Clone)]
pub struct ICalExporter {
    calendar_name: String,
}

impl Default for ICalExporter {
    fn default() -> Self {
        Self::new("Class Schedule")
    }
}

impl ICalExporter {
    pub fn new(calendar_name: impl Into<String>) -> Self {
        Self {
            calendar_name: calendar_name.into(),
        }
    }

    /// Weekly recurring events, first occurrence in the week starting `monday`.
    pub fn generate(&self, entries: &[ScheduleEntry], monday: NaiveDate) -> Vec<u8> {
        if entries.is_empty() {
            return Vec::new();
        }

        let mut calendar = Calendar::new();
        calendar.name(&self.calendar_name);

        for entry in entries {
            let date = monday + Duration::days(entry.weekday.days_from_monday());
            let categories: Vec<&str> = entry.categories.iter().map(|c| c.as_str()).collect();

            let mut event = Event::new();
            event.summary(&entry.class_name);
            event.starts(date.and_time(entry.start_time));
            event.ends(date.and_time(entry.end_time));
            event.add_property("RRULE", "FREQ=WEEKLY");
            event.description(&format!(
                "{} ({} min)\nCategories: {}",
                entry.class_name,
                entry.duration_min,
                if categories.is_empty() {
                    "none".to_string()
                } else {
                    categories.join(", ")
                }
            ));
            event.uid(&format!("{}-pfa-schedule", entry.instance_id));
            calendar.push(event);
        }

        calendar.to_string().into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;
    use crate::models::{CategoryName, Weekday};

    fn entry() -> ScheduleEntry {
        ScheduleEntry {
            instance_id: 7,
            class_id: 2,
            class_name: "Muay Thai".to_string(),
            categories: vec![CategoryName::Striking],
            weekday: Weekday::Wednesday,
            weekday_label: "Wednesday".to_string(),
            start_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(19, 30, 0).unwrap(),
            duration_min: 90,
            deleted: false,
        }
    }

    #[test]
    fn test_generate_recurring_event() {
        let exporter = ICalExporter::default();
        let monday = NaiveDate::from_ymd_opt(2025, 11, 24).unwrap();
        let body = String::from_utf8(exporter.generate(&[entry()], monday)).unwrap();
        assert!(body.contains("BEGIN:VEVENT"));
        assert!(body.contains("SUMMARY:Muay Thai"));
        assert!(body.contains("RRULE:FREQ=WEEKLY"));
        assert!(body.contains("20251126T180000"));
        assert!(body.contains("UID:7-pfa-schedule"));
    }

    #[test]
    fn test_generate_empty() {
        let exporter = ICalExporter::default();
        let monday = NaiveDate::from_ymd_opt(2025, 11, 24).unwrap();
        assert!(exporter.generate(&[], monday).is_empty());
    }
}
