//! Translation from source patterns to the neutral rule, and validation of
//! the rendered rule before it reaches the sink.

use chrono::{DateTime, Utc};
use rrule::RRuleSet;

use crate::error::{CalBridgeError, CalBridgeResult};
use crate::recurrence::source::{SourcePattern, SourceRecurrence};
use crate::recurrence::{
    Frequency, Period, RecurrenceRule, Termination, Weekday, WeekdayNum, format_utc,
};

/// Build the neutral rule from a source pattern.
///
/// `now` decides whether a pattern end date still matters: an end date in
/// the past is dropped rather than turned into an UNTIL.
pub fn parse(source: &SourceRecurrence, now: DateTime<Utc>) -> CalBridgeResult<RecurrenceRule> {
    let pattern = SourcePattern::try_from(source)?;

    let frequency = match pattern {
        SourcePattern::Daily => Frequency::Daily,
        SourcePattern::Weekly { .. } => Frequency::Weekly,
        SourcePattern::Monthly { .. } => Frequency::Monthly,
        SourcePattern::MonthlyNth { .. } => Frequency::MonthlyNth,
        SourcePattern::Yearly { .. } => Frequency::Yearly,
        SourcePattern::YearlyNth { .. } => Frequency::YearlyNth,
    };

    let mut rule = RecurrenceRule::new(frequency);
    rule.interval = source.interval.max(1);
    rule.first_day_of_week = Weekday::Monday;

    let count = source.occurrences.filter(|c| *c > 0);
    rule.termination = match (count, source.pattern_end) {
        (Some(count), _) => Some(Termination::Count(count)),
        (None, Some(end)) if end > now => Some(Termination::Until(end)),
        _ => None,
    };

    match pattern {
        SourcePattern::Daily => {}
        SourcePattern::Weekly { days } | SourcePattern::Yearly { days } => {
            rule.by_day = days.into_iter().map(WeekdayNum::every).collect();
        }
        SourcePattern::Monthly { day_of_month } => {
            if count.is_none() {
                rule.by_month_day = day_of_month.map(|d| d as i32).into_iter().collect();
            }
        }
        SourcePattern::MonthlyNth { days, instance }
        | SourcePattern::YearlyNth { days, instance } => {
            rule.by_day = days.into_iter().map(WeekdayNum::every).collect();
            rule.by_set_position = vec![instance];
        }
    }

    for exception in &source.exceptions {
        rule.exclusions.push(exception.original);
        if let (Some(start), Some(end)) = (exception.replacement_start, exception.replacement_end) {
            rule.inclusions.push(Period { start, end });
        }
    }

    Ok(rule)
}

/// Check the rendered rule with a full RRULE parser, anchored at `start`.
///
/// Period inclusions are not part of the check; the parser has no support for
/// `VALUE=PERIOD`.
pub fn validate(rule: &RecurrenceRule, start: DateTime<Utc>) -> CalBridgeResult<()> {
    let mut lines = vec![format!("DTSTART:{}", format_utc(&start)), rule.rrule_line()];
    lines.extend(rule.exdate_line());

    lines
        .join("\n")
        .parse::<RRuleSet>()
        .map(|_| ())
        .map_err(|e| CalBridgeError::RecurrenceParse(format!("{}: {}", rule.rrule_line(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::source::SourceException;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn source(kind: &str) -> SourceRecurrence {
        SourceRecurrence {
            kind: kind.to_string(),
            interval: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_weekly_round_trip() {
        let weekly = SourceRecurrence {
            interval: 2,
            occurrences: Some(10),
            // Monday | Wednesday
            day_of_week_mask: 2 | 8,
            ..source("Weekly")
        };

        let rule = parse(&weekly, now()).unwrap();
        assert_eq!(
            rule.to_lines(),
            vec!["RRULE:FREQ=WEEKLY;INTERVAL=2;COUNT=10;BYDAY=MO,WE".to_string()]
        );
        assert_eq!(rule.first_day_of_week, Weekday::Monday);
    }

    #[test]
    fn test_daily_exception_renders_exdate() {
        let daily = SourceRecurrence {
            exceptions: vec![SourceException {
                original: Utc.with_ymd_and_hms(2024, 1, 3, 9, 0, 0).unwrap(),
                replacement_start: None,
                replacement_end: None,
            }],
            ..source("Daily")
        };

        let lines = parse(&daily, now()).unwrap().to_lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "EXDATE:20240103T090000Z");
    }

    #[test]
    fn test_moved_occurrence_adds_inclusion() {
        let daily = SourceRecurrence {
            exceptions: vec![SourceException {
                original: Utc.with_ymd_and_hms(2024, 1, 3, 9, 0, 0).unwrap(),
                replacement_start: Some(Utc.with_ymd_and_hms(2024, 1, 4, 14, 0, 0).unwrap()),
                replacement_end: Some(Utc.with_ymd_and_hms(2024, 1, 4, 15, 0, 0).unwrap()),
            }],
            ..source("Daily")
        };

        let rule = parse(&daily, now()).unwrap();
        assert_eq!(rule.exclusions.len(), 1);
        assert_eq!(rule.inclusions.len(), 1);
        assert_eq!(
            rule.to_lines()[2],
            "RDATE;VALUE=PERIOD:20240104T140000Z/20240104T150000Z"
        );
    }

    #[test]
    fn test_count_wins_over_until() {
        let end = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let both = SourceRecurrence {
            occurrences: Some(4),
            pattern_end: Some(end),
            ..source("Daily")
        };
        assert_eq!(
            parse(&both, now()).unwrap().termination,
            Some(Termination::Count(4))
        );

        let until_only = SourceRecurrence {
            pattern_end: Some(end),
            ..source("Daily")
        };
        assert_eq!(
            parse(&until_only, now()).unwrap().termination,
            Some(Termination::Until(end))
        );
    }

    #[test]
    fn test_past_end_date_is_ignored() {
        let past = SourceRecurrence {
            pattern_end: Some(Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap()),
            ..source("Daily")
        };
        assert_eq!(parse(&past, now()).unwrap().termination, None);
    }

    #[test]
    fn test_monthly_falls_back_to_day_of_month() {
        let monthly = SourceRecurrence {
            day_of_month: Some(15),
            ..source("Monthly")
        };
        assert_eq!(
            parse(&monthly, now()).unwrap().rrule_line(),
            "RRULE:FREQ=MONTHLY;INTERVAL=1;BYMONTHDAY=15"
        );

        let counted = SourceRecurrence {
            occurrences: Some(3),
            ..monthly
        };
        assert_eq!(
            parse(&counted, now()).unwrap().rrule_line(),
            "RRULE:FREQ=MONTHLY;INTERVAL=1;COUNT=3"
        );
    }

    #[test]
    fn test_nth_patterns_record_set_position() {
        let second_tuesday = SourceRecurrence {
            day_of_week_mask: 4,
            instance: Some(2),
            ..source("MonthlyNth")
        };
        assert_eq!(
            parse(&second_tuesday, now()).unwrap().rrule_line(),
            "RRULE:FREQ=MONTHLY;INTERVAL=1;BYDAY=TU;BYSETPOS=2"
        );

        let last_friday = SourceRecurrence {
            day_of_week_mask: 32,
            instance: Some(-1),
            ..source("YearlyNth")
        };
        let rule = parse(&last_friday, now()).unwrap();
        assert_eq!(rule.frequency, Frequency::YearlyNth);
        assert_eq!(
            rule.rrule_line(),
            "RRULE:FREQ=YEARLY;INTERVAL=1;BYDAY=FR;BYSETPOS=-1"
        );
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let daily = SourceRecurrence {
            interval: 0,
            ..source("Daily")
        };
        assert_eq!(parse(&daily, now()).unwrap().interval, 1);
    }

    #[test]
    fn test_unknown_type_is_a_hard_error() {
        let err = parse(&source("Hourly"), now()).unwrap_err();
        assert!(matches!(
            err,
            CalBridgeError::RecurrenceParse(ref m) if m == "unsupported recurrence type 'Hourly'"
        ));
    }

    #[test]
    fn test_validate_accepts_generated_rules() {
        let weekly = SourceRecurrence {
            interval: 2,
            occurrences: Some(10),
            day_of_week_mask: 2 | 8,
            ..source("Weekly")
        };
        let rule = parse(&weekly, now()).unwrap();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        assert!(validate(&rule, start).is_ok());
    }

    #[test]
    fn test_validate_rejects_impossible_rules() {
        let mut rule = RecurrenceRule::new(Frequency::Monthly);
        rule.by_month_day = vec![42];
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();

        assert!(matches!(
            validate(&rule, start),
            Err(CalBridgeError::RecurrenceParse(_))
        ));
    }
}
