//! Provider-neutral recurrence rule and its RRULE/EXDATE text form.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{CalBridgeError, CalBridgeResult};

/// `yyyymmddThhmmssZ`, the only instant format the sink accepts in rules.
pub const UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";

pub fn format_utc(instant: &DateTime<Utc>) -> String {
    instant.format(UTC_FORMAT).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    MonthlyNth,
    Yearly,
    YearlyNth,
}

impl Frequency {
    fn rrule_name(&self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly | Frequency::MonthlyNth => "MONTHLY",
            Frequency::Yearly | Frequency::YearlyNth => "YEARLY",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    /// Canonical order, Monday first.
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Weekday::Monday => "MO",
            Weekday::Tuesday => "TU",
            Weekday::Wednesday => "WE",
            Weekday::Thursday => "TH",
            Weekday::Friday => "FR",
            Weekday::Saturday => "SA",
            Weekday::Sunday => "SU",
        }
    }

    pub fn from_code(code: &str) -> Option<Weekday> {
        Weekday::ALL.into_iter().find(|d| d.code() == code)
    }
}

/// A BYDAY entry, optionally qualified with an ordinal ("2TU", "-1FR").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekdayNum {
    pub ordinal: Option<i8>,
    pub weekday: Weekday,
}

impl WeekdayNum {
    pub fn every(weekday: Weekday) -> Self {
        WeekdayNum {
            ordinal: None,
            weekday,
        }
    }
}

impl fmt::Display for WeekdayNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ordinal {
            Some(n) => write!(f, "{}{}", n, self.weekday.code()),
            None => write!(f, "{}", self.weekday.code()),
        }
    }
}

impl FromStr for WeekdayNum {
    type Err = CalBridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || CalBridgeError::RecurrenceParse(format!("invalid BYDAY '{s}'"));
        let split = s.len().saturating_sub(2);
        if !s.is_char_boundary(split) {
            return Err(invalid());
        }
        let (ordinal, code) = s.split_at(split);
        let weekday = Weekday::from_code(code).ok_or_else(invalid)?;
        let ordinal = if ordinal.is_empty() {
            None
        } else {
            Some(
                ordinal
                    .trim_start_matches('+')
                    .parse::<i8>()
                    .map_err(|_| invalid())?,
            )
        };
        Ok(WeekdayNum { ordinal, weekday })
    }
}

/// How the pattern ends. Count and until are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    Count(u32),
    Until(DateTime<Utc>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Restriction {
    #[default]
    Default,
    Restrict,
    RestrictButAdjust,
}

/// A moved occurrence's new start and end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", format_utc(&self.start), format_utc(&self.end))
    }
}

impl FromStr for Period {
    type Err = CalBridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once('/')
            .ok_or_else(|| CalBridgeError::RecurrenceParse(format!("invalid period '{s}'")))?;
        Ok(Period {
            start: parse_instant(start, None)?,
            end: parse_instant(end, None)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    pub interval: u32,
    pub termination: Option<Termination>,
    pub first_day_of_week: Weekday,
    #[serde(default)]
    pub restriction: Restriction,
    #[serde(default)]
    pub by_day: Vec<WeekdayNum>,
    #[serde(default)]
    pub by_month_day: Vec<i32>,
    #[serde(default)]
    pub by_set_position: Vec<i32>,
    /// Occurrence instants removed from the pattern
    #[serde(default)]
    pub exclusions: Vec<DateTime<Utc>>,
    /// Replacement slots for occurrences that were moved
    #[serde(default)]
    pub inclusions: Vec<Period>,
}

impl RecurrenceRule {
    pub fn new(frequency: Frequency) -> Self {
        RecurrenceRule {
            frequency,
            interval: 1,
            termination: None,
            first_day_of_week: Weekday::Monday,
            restriction: Restriction::Default,
            by_day: Vec::new(),
            by_month_day: Vec::new(),
            by_set_position: Vec::new(),
            exclusions: Vec::new(),
            inclusions: Vec::new(),
        }
    }

    /// The `RRULE:` line.
    pub fn rrule_line(&self) -> String {
        let mut parts = vec![
            format!("FREQ={}", self.frequency.rrule_name()),
            format!("INTERVAL={}", self.interval),
        ];

        match self.termination {
            Some(Termination::Count(count)) => parts.push(format!("COUNT={count}")),
            Some(Termination::Until(until)) => parts.push(format!("UNTIL={}", format_utc(&until))),
            None => {}
        }

        if !self.by_day.is_empty() {
            parts.push(format!("BYDAY={}", join(&self.by_day)));
        }
        if !self.by_month_day.is_empty() {
            parts.push(format!("BYMONTHDAY={}", join(&self.by_month_day)));
        }
        if !self.by_set_position.is_empty() {
            parts.push(format!("BYSETPOS={}", join(&self.by_set_position)));
        }

        format!("RRULE:{}", parts.join(";"))
    }

    /// The `EXDATE:` line, if any occurrence is excluded.
    pub fn exdate_line(&self) -> Option<String> {
        if self.exclusions.is_empty() {
            return None;
        }
        let dates: Vec<String> = self.exclusions.iter().map(format_utc).collect();
        Some(format!("EXDATE:{}", dates.join(",")))
    }

    /// The `RDATE;VALUE=PERIOD:` line, if any occurrence was moved.
    pub fn rdate_line(&self) -> Option<String> {
        if self.inclusions.is_empty() {
            return None;
        }
        Some(format!("RDATE;VALUE=PERIOD:{}", join(&self.inclusions)))
    }

    /// All lines in the order the sink expects them.
    pub fn to_lines(&self) -> Vec<String> {
        let mut lines = vec![self.rrule_line()];
        lines.extend(self.exdate_line());
        lines.extend(self.rdate_line());
        lines
    }

    /// Parse the sink's rule lines back into the neutral model.
    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> CalBridgeResult<Self> {
        let mut rule: Option<RecurrenceRule> = None;
        let mut exclusions = Vec::new();
        let mut inclusions = Vec::new();

        for line in lines {
            let line = line.as_ref().trim();
            if line.is_empty() {
                continue;
            }
            let (head, value) = line.split_once(':').ok_or_else(|| {
                CalBridgeError::RecurrenceParse(format!("malformed rule line '{line}'"))
            })?;
            let mut params = head.split(';');
            let name = params.next().unwrap_or_default().to_ascii_uppercase();
            let tzid = params.find_map(|p| p.strip_prefix("TZID="));

            match name.as_str() {
                "RRULE" => rule = Some(parse_rrule_value(value)?),
                "EXDATE" => {
                    for token in value.split(',').filter(|t| !t.is_empty()) {
                        exclusions.push(parse_instant(token, tzid)?);
                    }
                }
                "RDATE" => {
                    for token in value.split(',').filter(|t| !t.is_empty()) {
                        inclusions.push(token.parse::<Period>()?);
                    }
                }
                other => {
                    tracing::debug!(property = other, "ignoring unsupported recurrence line");
                }
            }
        }

        let mut rule =
            rule.ok_or_else(|| CalBridgeError::RecurrenceParse("missing RRULE line".into()))?;
        rule.exclusions = exclusions;
        rule.inclusions = inclusions;
        Ok(rule)
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_lines().join("\n"))
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_rrule_value(value: &str) -> CalBridgeResult<RecurrenceRule> {
    let mut freq = None;
    let mut rule = RecurrenceRule::new(Frequency::Daily);

    for part in value.split(';').filter(|p| !p.is_empty()) {
        let (key, val) = part
            .split_once('=')
            .ok_or_else(|| CalBridgeError::RecurrenceParse(format!("malformed part '{part}'")))?;

        match key.to_ascii_uppercase().as_str() {
            "FREQ" => freq = Some(val.to_ascii_uppercase()),
            "INTERVAL" => rule.interval = parse_number(key, val)?,
            "COUNT" => set_termination(&mut rule, Termination::Count(parse_number(key, val)?))?,
            "UNTIL" => set_termination(&mut rule, Termination::Until(parse_instant(val, None)?))?,
            "WKST" => {
                rule.first_day_of_week = Weekday::from_code(val).ok_or_else(|| {
                    CalBridgeError::RecurrenceParse(format!("invalid WKST '{val}'"))
                })?
            }
            "BYDAY" => {
                rule.by_day = val
                    .split(',')
                    .map(str::parse)
                    .collect::<CalBridgeResult<_>>()?
            }
            "BYMONTHDAY" => rule.by_month_day = parse_list(key, val)?,
            "BYSETPOS" => rule.by_set_position = parse_list(key, val)?,
            other => tracing::debug!(part = other, "ignoring unsupported RRULE part"),
        }
    }

    let nth = !rule.by_set_position.is_empty() || rule.by_day.iter().any(|d| d.ordinal.is_some());
    rule.frequency = match freq.as_deref() {
        Some("DAILY") => Frequency::Daily,
        Some("WEEKLY") => Frequency::Weekly,
        Some("MONTHLY") if nth => Frequency::MonthlyNth,
        Some("MONTHLY") => Frequency::Monthly,
        Some("YEARLY") if nth => Frequency::YearlyNth,
        Some("YEARLY") => Frequency::Yearly,
        Some(other) => {
            return Err(CalBridgeError::RecurrenceParse(format!(
                "unsupported recurrence type '{other}'"
            )));
        }
        None => return Err(CalBridgeError::RecurrenceParse("missing FREQ".into())),
    };

    Ok(rule)
}

fn set_termination(rule: &mut RecurrenceRule, termination: Termination) -> CalBridgeResult<()> {
    if rule.termination.is_some() {
        return Err(CalBridgeError::RecurrenceParse(
            "COUNT and UNTIL are mutually exclusive".into(),
        ));
    }
    rule.termination = Some(termination);
    Ok(())
}

fn parse_number<T: FromStr>(key: &str, val: &str) -> CalBridgeResult<T> {
    val.parse()
        .map_err(|_| CalBridgeError::RecurrenceParse(format!("invalid {key} '{val}'")))
}

fn parse_list(key: &str, val: &str) -> CalBridgeResult<Vec<i32>> {
    val.split(',').map(|v| parse_number(key, v)).collect()
}

/// Parse `yyyymmddThhmmssZ`, a floating/zoned `yyyymmddThhmmss`, or a bare date.
fn parse_instant(token: &str, tzid: Option<&str>) -> CalBridgeResult<DateTime<Utc>> {
    let token = token.trim();
    let invalid = || CalBridgeError::RecurrenceParse(format!("invalid date-time '{token}'"));

    if let Some(utc) = token.strip_suffix('Z') {
        let naive = NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S").map_err(|_| invalid())?;
        return Ok(naive.and_utc());
    }

    let naive = match NaiveDateTime::parse_from_str(token, "%Y%m%dT%H%M%S") {
        Ok(naive) => naive,
        Err(_) => NaiveDate::parse_from_str(token, "%Y%m%d")
            .map_err(|_| invalid())?
            .and_hms_opt(0, 0, 0)
            .ok_or_else(invalid)?,
    };

    match tzid {
        Some(tzid) => {
            let tz: Tz = tzid.parse().map_err(|_| {
                CalBridgeError::RecurrenceParse(format!("unknown time zone '{tzid}'"))
            })?;
            tz.from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .ok_or_else(invalid)
        }
        None => Ok(naive.and_utc()),
    }
}
