use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Day of the week a class instance runs on, stored as the codes `1`..`7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Weekday {
    Monday = 1,
    Tuesday = 2,
    Wednesday = 3,
    Thursday = 4,
    Friday = 5,
    Saturday = 6,
    Sunday = 7,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code).checked_sub(1)?).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
            Weekday::Saturday => "Saturday",
            Weekday::Sunday => "Sunday",
        }
    }

    pub fn from_chrono(day: chrono::Weekday) -> Self {
        // number_from_monday is always 1..=7
        Self::from_code(day.number_from_monday() as u8).unwrap_or(Weekday::Monday)
    }

    pub fn days_from_monday(self) -> i64 {
        i64::from(self.code()) - 1
    }
}

impl From<Weekday> for u8 {
    fn from(value: Weekday) -> Self {
        value.code()
    }
}

impl TryFrom<u8> for Weekday {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Weekday::from_code(value).ok_or_else(|| format!("weekday must be between 1 and 7, got {value}"))
    }
}

impl FromStr for Weekday {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code: u8 = s
            .trim()
            .parse()
            .map_err(|_| format!("invalid weekday code: {s}"))?;
        Weekday::try_from(code)
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Fixed set of category labels a class can be tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
pub enum CategoryName {
    Striking,
    Grappling,
    Fitness,
    Lifestyle,
}

impl CategoryName {
    pub fn as_str(self) -> &'static str {
        match self {
            CategoryName::Striking => "Striking",
            CategoryName::Grappling => "Grappling",
            CategoryName::Fitness => "Fitness",
            CategoryName::Lifestyle => "Lifestyle",
        }
    }
}

impl FromStr for CategoryName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Striking" => Ok(CategoryName::Striking),
            "Grappling" => Ok(CategoryName::Grappling),
            "Fitness" => Ok(CategoryName::Fitness),
            "Lifestyle" => Ok(CategoryName::Lifestyle),
            other => Err(format!("unknown class category: {other}")),
        }
    }
}

impl fmt::Display for CategoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category selector accepted by the public schedule view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CategoryFilter {
    #[default]
    All,
    Striking,
    Grappling,
}

impl CategoryFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            CategoryFilter::All => "all",
            CategoryFilter::Striking => "striking",
            CategoryFilter::Grappling => "grappling",
        }
    }

    /// Stored category label this filter matches, `None` for `all`.
    pub fn category(self) -> Option<CategoryName> {
        match self {
            CategoryFilter::All => None,
            CategoryFilter::Striking => Some(CategoryName::Striking),
            CategoryFilter::Grappling => Some(CategoryName::Grappling),
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(CategoryFilter::All),
            "striking" => Ok(CategoryFilter::Striking),
            "grappling" => Ok(CategoryFilter::Grappling),
            other => Err(format!("unknown category filter: {other}")),
        }
    }
}

/// Which soft-deleted rows a read should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    ActiveOnly,
    IncludeDeleted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ClassCategory {
    pub id: i64,
    pub category: CategoryName,
    #[schema(value_type = String, format = "date-time")]
    pub created: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct TrainingClass {
    pub id: i64,
    pub name: String,
    pub categories: Vec<ClassCategory>,
    pub deleted: bool,
    #[schema(value_type = String, format = "date-time")]
    pub created: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ClassInstance {
    pub id: i64,
    pub class_id: i64,
    pub class_name: String,
    #[schema(value_type = u8, minimum = 1, maximum = 7)]
    pub weekday: Weekday,
    #[schema(value_type = String, example = "18:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "19:30:00")]
    pub end_time: NaiveTime,
    pub time_span: i64,
    pub deleted: bool,
    #[schema(value_type = String, format = "date-time")]
    pub created: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated: DateTime<Utc>,
}

impl fmt::Display for ClassInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {} - {}",
            self.class_name,
            self.weekday,
            self.start_time.format("%H:%M:%S"),
            self.end_time.format("%H:%M:%S")
        )
    }
}

/// One row of the schedule view: an instance joined with its class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ScheduleEntry {
    pub instance_id: i64,
    pub class_id: i64,
    pub class_name: String,
    pub categories: Vec<CategoryName>,
    #[schema(value_type = u8, minimum = 1, maximum = 7)]
    pub weekday: Weekday,
    pub weekday_label: String,
    #[schema(value_type = String, example = "18:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "19:30:00")]
    pub end_time: NaiveTime,
    pub duration_min: i64,
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ScheduleView {
    #[schema(value_type = u8, minimum = 1, maximum = 7)]
    pub day: Weekday,
    pub day_label: String,
    pub category: CategoryFilter,
    pub classes: Vec<ScheduleEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct WeeklyScheduleDay {
    #[schema(value_type = u8, minimum = 1, maximum = 7)]
    pub day: Weekday,
    pub day_label: String,
    pub classes: Vec<ScheduleEntry>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CategoryInput {
    pub category: CategoryName,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ClassInput {
    pub name: String,
    #[serde(default)]
    pub categories: Vec<i64>,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct InstanceInput {
    pub class_id: i64,
    #[schema(value_type = u8, minimum = 1, maximum = 7)]
    pub weekday: Weekday,
    #[schema(value_type = String, example = "18:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "19:30:00")]
    pub end_time: NaiveTime,
    pub time_span: Option<i64>,
    #[serde(default)]
    pub deleted: bool,
}
