//! Calendar month periods (`YYYY-MM`)

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::OpsError;

/// A calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, OpsError> {
        if !(1..=12).contains(&month) || NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(OpsError::InvalidMonth(format!("{:04}-{:02}", year, month)));
        }
        Ok(Self { year, month })
    }

    /// The month containing `date`
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The calendar month before the one containing `today`
    pub fn previous_of(today: NaiveDate) -> Self {
        Self::of(today).previous()
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        // year/month validated on construction
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Last calendar day: first day of the following month minus one day.
    pub fn last_day(&self) -> NaiveDate {
        let following = self.next().first_day();
        following.pred_opt().unwrap_or(following)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = OpsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || OpsError::InvalidMonth(s.to_string());
        let (y, m) = s.trim().split_once('-').ok_or_else(invalid)?;
        if y.len() != 4 || m.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = y.parse().map_err(|_| invalid())?;
        let month: u32 = m.parse().map_err(|_| invalid())?;
        Self::new(year, month).map_err(|_| invalid())
    }
}

impl TryFrom<String> for YearMonth {
    type Error = OpsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        let ym: YearMonth = "2024-03".parse().unwrap();
        assert_eq!(ym.year(), 2024);
        assert_eq!(ym.month(), 3);
        assert_eq!(ym.to_string(), "2024-03");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        for bad in ["2024-13", "2024-00", "2024/03", "24-03", "2024-3", "march", ""] {
            assert!(bad.parse::<YearMonth>().is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_last_day_handles_month_lengths() {
        assert_eq!("2024-03".parse::<YearMonth>().unwrap().last_day(), date(2024, 3, 31));
        assert_eq!("2024-04".parse::<YearMonth>().unwrap().last_day(), date(2024, 4, 30));
        // 2024 is a leap year
        assert_eq!("2024-02".parse::<YearMonth>().unwrap().last_day(), date(2024, 2, 29));
        assert_eq!("2023-02".parse::<YearMonth>().unwrap().last_day(), date(2023, 2, 28));
    }

    #[test]
    fn test_december_rolls_over_without_year_error() {
        let dec = "2024-12".parse::<YearMonth>().unwrap();
        assert_eq!(dec.last_day(), date(2024, 12, 31));
        assert_eq!(dec.next().to_string(), "2025-01");
    }

    #[test]
    fn test_previous_month_wraps_january() {
        assert_eq!(YearMonth::previous_of(date(2024, 1, 15)).to_string(), "2023-12");
        assert_eq!(YearMonth::previous_of(date(2024, 3, 1)).to_string(), "2024-02");
    }

    #[test]
    fn test_serde_as_string() {
        let ym: YearMonth = serde_json::from_str("\"2024-05\"").unwrap();
        assert_eq!(serde_json::to_string(&ym).unwrap(), "\"2024-05\"");
        assert!(serde_json::from_str::<YearMonth>("\"2024-5\"").is_err());
    }
}
