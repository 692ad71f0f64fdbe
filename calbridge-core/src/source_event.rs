//! Events as the source reports them on pull.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CalBridgeResult;
use crate::event::{Attendee, Event, Location, Person};
use crate::recurrence::{self, SourceRecurrence};

/// A pulled event, recurrence still in the source's native form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceEvent {
    pub id: String,
    pub organizer: Option<Person>,
    pub creator: Option<Person>,
    pub created: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub summary: String,
    pub description: Option<String>,
    pub location: Option<Location>,
    pub recurrence: Option<SourceRecurrence>,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
}

impl SourceEvent {
    /// Convert to a neutral [`Event`], translating the recurrence.
    pub fn to_event(&self, now: DateTime<Utc>) -> CalBridgeResult<Event> {
        let recurrence = self
            .recurrence
            .as_ref()
            .map(|r| recurrence::parse(r, now))
            .transpose()?;

        Ok(Event {
            recurrence,
            ..self.without_recurrence()
        })
    }

    /// The event with its recurrence left out.
    pub fn without_recurrence(&self) -> Event {
        Event {
            id: self.id.clone(),
            organizer: self.organizer.clone(),
            creator: self.creator.clone(),
            created: self.created,
            last_modified: self.last_modified,
            start: self.start,
            end: self.end,
            summary: self.summary.clone(),
            description: self.description.clone(),
            location: self.location.clone(),
            recurrence: None,
            attendees: self.attendees.clone(),
            action: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::Frequency;
    use chrono::TimeZone;

    #[test]
    fn test_to_event_translates_recurrence() {
        let source = SourceEvent {
            id: "e1".to_string(),
            summary: "Gym".to_string(),
            recurrence: Some(SourceRecurrence {
                kind: "Weekly".to_string(),
                interval: 1,
                day_of_week_mask: 2,
                ..Default::default()
            }),
            ..Default::default()
        };

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let event = source.to_event(now).unwrap();
        assert_eq!(event.id, "e1");
        assert_eq!(event.summary, "Gym");
        assert_eq!(event.recurrence.unwrap().frequency, Frequency::Weekly);
    }

    #[test]
    fn test_to_event_surfaces_unknown_pattern() {
        let source = SourceEvent {
            id: "e1".to_string(),
            recurrence: Some(SourceRecurrence {
                kind: "Lunar".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };

        let err = source.to_event(Utc::now()).unwrap_err();
        assert!(err.is_recurrence_error());
        assert!(source.without_recurrence().recurrence.is_none());
    }
}
