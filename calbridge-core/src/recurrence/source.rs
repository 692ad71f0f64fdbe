//! Source-native recurrence representation.
//!
//! Sources report a flat pattern object tagged with a frequency type. It is
//! narrowed into the closed [`SourcePattern`] union before translation; an
//! unknown tag is a typed error, never silently dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CalBridgeError, CalBridgeResult};
use crate::recurrence::Weekday;

fn default_interval() -> u32 {
    1
}

/// A recurrence pattern as the source reports it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceRecurrence {
    /// Frequency type: Daily, Weekly, Monthly, MonthlyNth, Yearly, YearlyNth
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_interval")]
    pub interval: u32,
    pub occurrences: Option<u32>,
    pub pattern_end: Option<DateTime<Utc>>,
    /// Sun=1, Mon=2, Tue=4, Wed=8, Thu=16, Fri=32, Sat=64
    #[serde(default)]
    pub day_of_week_mask: u8,
    pub day_of_month: Option<u32>,
    pub instance: Option<i32>,
    #[serde(default)]
    pub exceptions: Vec<SourceException>,
}

/// An occurrence the source reports as modified or removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceException {
    /// Start of the occurrence as the pattern originally placed it
    pub original: DateTime<Utc>,
    pub replacement_start: Option<DateTime<Utc>>,
    pub replacement_end: Option<DateTime<Utc>>,
}

/// Decompose a weekday bitmask, Monday first.
pub fn weekdays_from_mask(mask: u8) -> Vec<Weekday> {
    Weekday::ALL
        .into_iter()
        .filter(|day| mask & mask_bit(*day) != 0)
        .collect()
}

fn mask_bit(day: Weekday) -> u8 {
    match day {
        Weekday::Sunday => 1,
        Weekday::Monday => 2,
        Weekday::Tuesday => 4,
        Weekday::Wednesday => 8,
        Weekday::Thursday => 16,
        Weekday::Friday => 32,
        Weekday::Saturday => 64,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourcePattern {
    Daily,
    Weekly { days: Vec<Weekday> },
    Monthly { day_of_month: Option<u32> },
    MonthlyNth { days: Vec<Weekday>, instance: i32 },
    Yearly { days: Vec<Weekday> },
    YearlyNth { days: Vec<Weekday>, instance: i32 },
}

impl TryFrom<&SourceRecurrence> for SourcePattern {
    type Error = CalBridgeError;

    fn try_from(source: &SourceRecurrence) -> CalBridgeResult<Self> {
        let days = || weekdays_from_mask(source.day_of_week_mask);
        let instance = || {
            source.instance.ok_or_else(|| {
                CalBridgeError::RecurrenceParse(format!("{} pattern without instance", source.kind))
            })
        };

        Ok(match source.kind.as_str() {
            "Daily" => SourcePattern::Daily,
            "Weekly" => SourcePattern::Weekly { days: days() },
            "Monthly" => SourcePattern::Monthly {
                day_of_month: source.day_of_month,
            },
            "MonthlyNth" => SourcePattern::MonthlyNth {
                days: days(),
                instance: instance()?,
            },
            "Yearly" => SourcePattern::Yearly { days: days() },
            "YearlyNth" => SourcePattern::YearlyNth {
                days: days(),
                instance: instance()?,
            },
            other => {
                return Err(CalBridgeError::RecurrenceParse(format!(
                    "unsupported recurrence type '{other}'"
                )));
            }
        })
    }
}
