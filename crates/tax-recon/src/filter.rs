//! Restricting records to one category and one calendar month.

use crate::table::Cell;
use crate::{DateTime, TaxRecord, TransactionRecord};
use anyhow::{Context, bail};
use chrono::{DateTime as ZonedDateTime, Datelike, NaiveDate};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;

/// Order ids with this prefix belong to the membership module.
pub const MEMBERSHIP_PREFIX: &str = "MEM";
pub const MEMBERSHIP_MODULE: &str = "memberships";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetMonth {
    first_day: NaiveDate,
}

impl TargetMonth {
    pub fn new(year: i32, month: u32) -> anyhow::Result<Self> {
        if !(1..=12).contains(&month) {
            bail!("month must be between 1 and 12, got {month}");
        }
        let first_day = NaiveDate::from_ymd_opt(year, month, 1)
            .with_context(|| format!("{year}-{month:02} is out of range"))?;
        Ok(TargetMonth { first_day })
    }

    pub fn year(&self) -> i32 {
        self.first_day.year()
    }

    pub fn month(&self) -> u32 {
        self.first_day.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first_day
    }

    pub fn contains(&self, date: &DateTime) -> bool {
        date.year() == self.year() && date.month() == self.month()
    }

    /// Human readable form, e.g. `August 2025`.
    pub fn long_name(&self) -> String {
        self.first_day.format("%B %Y").to_string()
    }
}

impl fmt::Display for TargetMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl FromStr for TargetMonth {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .with_context(|| format!("expected YYYY-MM, got '{s}'"))?;
        let year = year
            .parse()
            .with_context(|| format!("invalid year in '{s}'"))?;
        let month = month
            .parse()
            .with_context(|| format!("invalid month in '{s}'"))?;
        TargetMonth::new(year, month)
    }
}

impl<'de> Deserialize<'de> for TargetMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// Parse a date cell. Unparseable values are `None`, never an error.
pub fn parse_date(cell: &Cell) -> Option<DateTime> {
    match cell {
        Cell::DateTime(datetime) => Some(*datetime),
        Cell::Text(text) => parse_date_str(text),
        Cell::Empty | Cell::Number(_) => None,
    }
}

pub fn parse_date_str(text: &str) -> Option<DateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    // offsets are dropped, the wall clock time of the export is what counts
    if let Ok(zoned) = ZonedDateTime::parse_from_rfc3339(text) {
        return Some(zoned.naive_local());
    }
    if let Ok(zoned) = ZonedDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(zoned.naive_local());
    }
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = DateTime::parse_from_str(text, format) {
            return Some(datetime);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Which module's records a run looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    /// Module transactions must belong to, e.g. `pos` or `memberships`.
    pub module: String,
    /// `Module Name` tax records must carry. `None` keeps every tax record.
    pub tax_module: Option<String>,
}

impl Category {
    pub fn new(module: impl Into<String>) -> Self {
        let module = module.into();
        Category {
            tax_module: Some(module.clone()),
            module,
        }
    }

    pub fn any_tax_module(mut self) -> Self {
        self.tax_module = None;
        self
    }

    pub fn memberships() -> Self {
        Category::new(MEMBERSHIP_MODULE).any_tax_module()
    }

    pub fn matches_transaction(&self, record: &TransactionRecord) -> bool {
        transaction_module(record) == self.module
    }

    pub fn matches_tax(&self, record: &TaxRecord) -> bool {
        match &self.tax_module {
            Some(module) => record.module_name == *module,
            None => true,
        }
    }
}

/// `memberships` for `MEM`-prefixed order ids, otherwise the record's source.
pub fn transaction_module(record: &TransactionRecord) -> &str {
    if record.order_id.starts_with(MEMBERSHIP_PREFIX) {
        MEMBERSHIP_MODULE
    } else {
        &record.source
    }
}

/// Keep the records whose date lies in `month`. Records without a date are dropped.
pub fn filter_month<T>(
    records: impl IntoIterator<Item = T>,
    month: TargetMonth,
    date_of: impl Fn(&T) -> Option<DateTime>,
) -> Vec<T> {
    records
        .into_iter()
        .filter(|record| date_of(record).is_some_and(|date| month.contains(&date)))
        .collect()
}

/// Like [`filter_month`], but when the primary date matches nothing and a
/// fallback date is given, filter by the fallback date instead.
pub fn filter_month_or_fallback<T: Clone>(
    records: Vec<T>,
    month: TargetMonth,
    primary: impl Fn(&T) -> Option<DateTime>,
    fallback: Option<&dyn Fn(&T) -> Option<DateTime>>,
) -> Vec<T> {
    let matched = filter_month(records.iter().cloned(), month, &primary);
    if !matched.is_empty() {
        return matched;
    }
    match fallback {
        Some(fallback) => {
            tracing::warn!(%month, "no records matched the primary date, using the fallback date");
            filter_month(records, month, fallback)
        }
        None => matched,
    }
}
