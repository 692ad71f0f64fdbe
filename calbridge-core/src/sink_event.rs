//! The sink's native event shape and conversion from [`Event`].

use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::CalBridgeResult;
use crate::event::{Attendee, Event, Person, ResponseStatus};
use crate::identity;
use crate::recurrence::{self, RecurrenceRule};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkPerson {
    #[serde(default)]
    pub display_name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkAttendee {
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    /// "accepted", "declined", "tentative" or "needsAction"
    pub response_status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkDateTime {
    pub date_time: DateTime<FixedOffset>,
    pub time_zone: String,
}

impl SinkDateTime {
    pub fn new(instant: DateTime<Utc>, tz: Tz) -> Self {
        SinkDateTime {
            date_time: instant.with_timezone(&tz).fixed_offset(),
            time_zone: tz.name().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkEvent {
    /// Encoded identity of the source event
    pub id: String,
    pub organizer: Option<SinkPerson>,
    pub creator: Option<SinkPerson>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub attendees: Vec<SinkAttendee>,
    pub start: SinkDateTime,
    pub end: SinkDateTime,
    /// RRULE, EXDATE and RDATE lines
    #[serde(default)]
    pub recurrence: Vec<String>,
    pub created: Option<DateTime<Utc>>,
    /// Revision counter, bumped on every update
    #[serde(default)]
    pub sequence: i64,
}

impl SinkEvent {
    /// Build the sink representation of `event`, with start/end annotated in `tz`.
    ///
    /// Fails if the id cannot be encoded, start/end are missing, or the
    /// recurrence does not survive validation. People with invalid email
    /// addresses are left out.
    pub fn from_event(event: &Event, tz: Tz) -> CalBridgeResult<Self> {
        let id = identity::encode(&event.id)?;
        let (start, end) = event.time_span()?;

        let recurrence = match &event.recurrence {
            Some(rule) => {
                recurrence::validate(rule, start)?;
                rule.to_lines()
            }
            None => Vec::new(),
        };

        let attendees = event
            .attendees
            .iter()
            .filter(|a| keep_person(&event.id, &a.person))
            .map(attendee_to_sink)
            .collect();

        Ok(SinkEvent {
            id,
            organizer: event
                .organizer
                .as_ref()
                .filter(|p| keep_person(&event.id, p))
                .map(person_to_sink),
            creator: event
                .creator
                .as_ref()
                .filter(|p| keep_person(&event.id, p))
                .map(person_to_sink),
            summary: event.summary.clone(),
            description: event.description.clone().unwrap_or_default(),
            location: event
                .location
                .as_ref()
                .map(|l| l.to_string())
                .unwrap_or_default(),
            attendees,
            start: SinkDateTime::new(start, tz),
            end: SinkDateTime::new(end, tz),
            recurrence,
            created: event.created,
            sequence: 0,
        })
    }

    /// Internal id this item was created from.
    pub fn internal_id(&self) -> CalBridgeResult<String> {
        identity::decode(&self.id)
    }

    pub fn rule(&self) -> CalBridgeResult<Option<RecurrenceRule>> {
        if self.recurrence.is_empty() {
            return Ok(None);
        }
        RecurrenceRule::from_lines(&self.recurrence).map(Some)
    }
}

fn keep_person(event_id: &str, person: &Person) -> bool {
    match person.validate() {
        Ok(()) => true,
        Err(_) => {
            warn!(id = %event_id, email = %person.email, "dropping person with invalid email");
            false
        }
    }
}

fn person_to_sink(person: &Person) -> SinkPerson {
    SinkPerson {
        display_name: person.display_name().unwrap_or_default(),
        email: person.email.clone(),
    }
}

fn attendee_to_sink(attendee: &Attendee) -> SinkAttendee {
    SinkAttendee {
        email: attendee.person.email.clone(),
        display_name: attendee.person.display_name().unwrap_or_default(),
        response_status: response_status_to_sink(attendee.response_status).to_string(),
    }
}

fn response_status_to_sink(status: ResponseStatus) -> &'static str {
    match status {
        ResponseStatus::Accepted | ResponseStatus::Organized => "accepted",
        ResponseStatus::Declined => "declined",
        ResponseStatus::Tentative => "tentative",
        ResponseStatus::None | ResponseStatus::NotResponded => "needsAction",
    }
}
