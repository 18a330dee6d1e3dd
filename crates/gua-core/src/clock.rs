use std::fmt;
use std::str::FromStr;

use chrono::{FixedOffset, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::GuaError;

/// Timezone used to decide which calendar day "today" is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Timezone {
    /// Host system timezone
    #[default]
    Local,
    Utc,
    Fixed(FixedOffset),
}

impl Timezone {
    pub fn today(&self) -> NaiveDate {
        match self {
            Timezone::Local => Local::now().date_naive(),
            Timezone::Utc => Utc::now().date_naive(),
            Timezone::Fixed(offset) => Utc::now().with_timezone(offset).date_naive(),
        }
    }
}

impl FromStr for Timezone {
    type Err = GuaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "local" | "" => return Ok(Timezone::Local),
            "utc" | "z" => return Ok(Timezone::Utc),
            _ => {}
        }
        parse_offset(trimmed)
            .map(Timezone::Fixed)
            .ok_or_else(|| GuaError::InvalidTimezone(s.to_string()))
    }
}

/// Parse `+08:00`, `-0530` or `+8` into a fixed offset.
fn parse_offset(s: &str) -> Option<FixedOffset> {
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    if !rest.bytes().all(|b| b.is_ascii_digit() || b == b':') {
        return None;
    }
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 => rest.split_at(2),
        None => (rest, "0"),
    };
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

impl TryFrom<String> for Timezone {
    type Error = GuaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timezone> for String {
    fn from(tz: Timezone) -> Self {
        tz.to_string()
    }
}

impl fmt::Display for Timezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timezone::Local => f.write_str("local"),
            Timezone::Utc => f.write_str("utc"),
            Timezone::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

/// Source of the current calendar date for quota resets.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Wall clock in a configured timezone.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    pub timezone: Timezone,
}

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        self.timezone.today()
    }
}
