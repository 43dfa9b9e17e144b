use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Range {
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "5y")]
    FiveYears,
    #[serde(rename = "10y")]
    TenYears,
    #[serde(rename = "max")]
    Max,
}

/// Floor for `Range::Max` on sources that take a start date.
const MAX_RANGE_FLOOR: (i32, u32, u32) = (2000, 1, 1);

impl Range {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneMonth => "1mo",
            Self::ThreeMonths => "3mo",
            Self::SixMonths => "6mo",
            Self::OneYear => "1y",
            Self::FiveYears => "5y",
            Self::TenYears => "10y",
            Self::Max => "max",
        }
    }

    fn months(self) -> Option<u32> {
        match self {
            Self::OneMonth => Some(1),
            Self::ThreeMonths => Some(3),
            Self::SixMonths => Some(6),
            Self::OneYear => Some(12),
            Self::FiveYears => Some(60),
            Self::TenYears => Some(120),
            Self::Max => None,
        }
    }

    /// First date covered by this range when it ends on `today`.
    pub fn start_date(self, today: NaiveDate) -> NaiveDate {
        let (y, m, d) = MAX_RANGE_FLOOR;
        let floor = NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN);
        match self.months() {
            Some(n) => today.checked_sub_months(Months::new(n)).unwrap_or(floor),
            None => floor,
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Range {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1mo" => Ok(Self::OneMonth),
            "3mo" => Ok(Self::ThreeMonths),
            "6mo" => Ok(Self::SixMonths),
            "1y" => Ok(Self::OneYear),
            "5y" => Ok(Self::FiveYears),
            "10y" => Ok(Self::TenYears),
            "max" => Ok(Self::Max),
            other => anyhow::bail!("invalid range '{other}', expected one of 1mo, 3mo, 6mo, 1y, 5y, 10y, max"),
        }
    }
}
