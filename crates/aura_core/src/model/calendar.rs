//! Calendar keys used for completions and month storage.
//!
//! # Responsibility
//! - Parse and format the zero-padded `YYYY-MM-DD` / `YYYY-MM` key strings.
//! - Provide month arithmetic for navigation and grid layout.
//!
//! # Invariants
//! - Only canonical zero-padded forms parse; `2024-9-1` is rejected.
//! - Formatting a parsed key yields the exact input string.
//! - Keys order chronologically, which matches their string order.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

static DATE_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date key regex"));
static MONTH_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}$").expect("valid month key regex"));

/// Rejected calendar key input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    InvalidDate(String),
    InvalidMonth(String),
}

impl Display for CalendarError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDate(value) => {
                write!(f, "invalid date `{value}`; expected YYYY-MM-DD")
            }
            Self::InvalidMonth(value) => write!(f, "invalid month `{value}`; expected YYYY-MM"),
        }
    }
}

impl Error for CalendarError {}

/// One calendar day, rendered as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(NaiveDate);

impl DateKey {
    /// Wraps a date. Years outside `0..=9999` cannot be represented in the
    /// four-digit key form and are rejected.
    pub fn from_date(date: NaiveDate) -> Result<Self, CalendarError> {
        if !(0..=9999).contains(&date.year()) {
            return Err(CalendarError::InvalidDate(date.to_string()));
        }
        Ok(Self(date))
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Result<Self, CalendarError> {
        let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
            CalendarError::InvalidDate(format!("{year:04}-{month:02}-{day:02}"))
        })?;
        Self::from_date(date)
    }

    /// Parses a canonical `YYYY-MM-DD` string.
    pub fn parse(value: &str) -> Result<Self, CalendarError> {
        if !DATE_KEY_RE.is_match(value) {
            return Err(CalendarError::InvalidDate(value.to_string()));
        }
        let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map_err(|_| CalendarError::InvalidDate(value.to_string()))?;
        Self::from_date(date)
    }

    pub fn date(self) -> NaiveDate {
        self.0
    }

    pub fn month(self) -> MonthKey {
        MonthKey {
            year: self.0.year(),
            month: self.0.month(),
        }
    }
}

impl Display for DateKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year(),
            self.0.month(),
            self.0.day()
        )
    }
}

impl FromStr for DateKey {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for DateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DateKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(D::Error::custom)
    }
}

/// One calendar month, rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Result<Self, CalendarError> {
        if !(0..=9999).contains(&year) || !(1..=12).contains(&month) {
            return Err(CalendarError::InvalidMonth(format!("{year:04}-{month:02}")));
        }
        Ok(Self { year, month })
    }

    /// Parses a canonical `YYYY-MM` string.
    pub fn parse(value: &str) -> Result<Self, CalendarError> {
        if !MONTH_KEY_RE.is_match(value) {
            return Err(CalendarError::InvalidMonth(value.to_string()));
        }
        let (year, month) = value
            .split_once('-')
            .ok_or_else(|| CalendarError::InvalidMonth(value.to_string()))?;
        let year = year
            .parse::<i32>()
            .map_err(|_| CalendarError::InvalidMonth(value.to_string()))?;
        let month = month
            .parse::<u32>()
            .map_err(|_| CalendarError::InvalidMonth(value.to_string()))?;
        Self::new(year, month).map_err(|_| CalendarError::InvalidMonth(value.to_string()))
    }

    pub fn of(date: DateKey) -> Self {
        date.month()
    }

    pub fn year(self) -> i32 {
        self.year
    }

    /// Month number, 1-based.
    pub fn month(self) -> u32 {
        self.month
    }

    pub fn contains(self, date: DateKey) -> bool {
        date.month() == self
    }

    pub fn first_day(self) -> DateKey {
        // Constructor keeps year/month in range, so day 1 always exists.
        DateKey(NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN))
    }

    pub fn previous(self) -> Option<Self> {
        match self.month {
            1 => Self::new(self.year - 1, 12).ok(),
            month => Self::new(self.year, month - 1).ok(),
        }
    }

    pub fn next(self) -> Option<Self> {
        match self.month {
            12 => Self::new(self.year + 1, 1).ok(),
            month => Self::new(self.year, month + 1).ok(),
        }
    }

    pub fn days_in_month(self) -> u32 {
        let first = self.first_day().date();
        let next_first = match self.month {
            12 => NaiveDate::from_ymd_opt(self.year + 1, 1, 1),
            month => NaiveDate::from_ymd_opt(self.year, month + 1, 1),
        };
        next_first.map_or(31, |next| (next - first).num_days() as u32)
    }

    /// Weekday of the first day, `0` = Sunday, for calendar grid offsets.
    pub fn first_weekday(self) -> u32 {
        self.first_day().date().weekday().num_days_from_sunday()
    }

    /// Every day of the month in order.
    pub fn dates(self) -> Vec<DateKey> {
        (1..=self.days_in_month())
            .filter_map(|day| DateKey::from_ymd(self.year, self.month, day).ok())
            .collect()
    }
}

impl Display for MonthKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(D::Error::custom)
    }
}
