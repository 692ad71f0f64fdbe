//! Recurrence translation between the source's native patterns, the neutral
//! [`RecurrenceRule`] and the sink's RRULE/EXDATE lines.

mod rule;
pub mod source;
mod translate;

pub use rule::{
    Frequency, Period, RecurrenceRule, Restriction, Termination, UTC_FORMAT, Weekday, WeekdayNum,
    format_utc,
};
pub use source::{SourceException, SourcePattern, SourceRecurrence};
pub use translate::{parse, validate};
