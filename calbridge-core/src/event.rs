//! Provider-neutral event types.
//!
//! Source events are converted into these types on pull, and the sync engine
//! works exclusively with them for diffing, snapshot storage and push.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CalBridgeError, CalBridgeResult};
use crate::recurrence::RecurrenceRule;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email pattern is a valid regex")
});

/// Check an address against the usual `local@domain` grammar.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Outcome of the most recent diff for an event. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Add,
    Update,
    Remove,
    Duplicate,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Add => write!(f, "+"),
            Action::Update => write!(f, "~"),
            Action::Remove => write!(f, "-"),
            Action::Duplicate => write!(f, "="),
        }
    }
}

/// A calendar event (provider-neutral).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Event {
    /// Stable identifier assigned by the source
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
    pub recurrence: Option<RecurrenceRule>,
    #[serde(default)]
    pub attendees: Vec<Attendee>,

    #[serde(skip)]
    pub action: Option<Action>,
}

impl Event {
    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    /// Attendees ordered by email, the order used for equality.
    pub fn sorted_attendees(&self) -> Vec<&Attendee> {
        let mut attendees: Vec<&Attendee> = self.attendees.iter().collect();
        attendees.sort_by(|a, b| a.person.email.cmp(&b.person.email));
        attendees
    }

    /// Fails if a start/end is missing or ends before it starts.
    pub fn time_span(&self) -> CalBridgeResult<(DateTime<Utc>, DateTime<Utc>)> {
        match (self.start, self.end) {
            (Some(start), Some(end)) if end >= start => Ok((start, end)),
            (Some(_), Some(_)) => Err(self.invalid("end is before start")),
            (None, _) => Err(self.invalid("missing start")),
            (_, None) => Err(self.invalid("missing end")),
        }
    }

    fn invalid(&self, reason: &str) -> CalBridgeError {
        CalBridgeError::InvalidEvent {
            id: self.id.clone(),
            reason: reason.to_string(),
        }
    }
}

/// Created/last-modified timestamps, summary, organizer and creator are
/// metadata and do not take part in equality. Attendees compare unordered.
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.start == other.start
            && self.end == other.end
            && self.location == other.location
            && self.description == other.description
            && self.recurrence == other.recurrence
            && self.attendees.len() == other.attendees.len()
            && self.sorted_attendees() == other.sorted_attendees()
    }
}

impl Eq for Event {}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.start {
            Some(start) => write!(f, "{} ({}) @ {}", self.summary, self.id, start.to_rfc3339()),
            None => write!(f, "{} ({})", self.summary, self.id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
}

impl Person {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> CalBridgeResult<Self> {
        let person = Person {
            name: Some(name.into()),
            email: email.into(),
            ..Default::default()
        };
        person.validate()?;
        Ok(person)
    }

    pub fn validate(&self) -> CalBridgeResult<()> {
        if is_valid_email(&self.email) {
            Ok(())
        } else {
            Err(CalBridgeError::InvalidEvent {
                id: self.email.clone(),
                reason: "not a valid email address".to_string(),
            })
        }
    }

    /// Best available display name: full name, then first + last.
    pub fn display_name(&self) -> Option<String> {
        if let Some(name) = self.name.as_ref().filter(|n| !n.trim().is_empty()) {
            return Some(name.clone());
        }
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|p| !p.trim().is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseStatus {
    Accepted,
    Declined,
    Tentative,
    Organized,
    #[default]
    None,
    NotResponded,
}

/// An event attendee: a person plus their reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    #[serde(flatten)]
    pub person: Person,
    #[serde(default)]
    pub response_status: ResponseStatus,
}

impl Attendee {
    pub fn new(email: impl Into<String>, response_status: ResponseStatus) -> Self {
        Attendee {
            person: Person {
                email: email.into(),
                ..Default::default()
            },
            response_status,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub longitude: Option<i32>,
    pub latitude: Option<i32>,
}

impl Location {
    pub fn named(name: impl Into<String>) -> Self {
        Location {
            name: name.into(),
            ..Default::default()
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_test_event() -> Event {
        Event {
            id: "evt-1".to_string(),
            summary: "Standup".to_string(),
            start: Some(Utc.with_ymd_and_hms(2024, 1, 3, 9, 0, 0).unwrap()),
            end: Some(Utc.with_ymd_and_hms(2024, 1, 3, 9, 15, 0).unwrap()),
            attendees: vec![
                Attendee::new("bob@example.com", ResponseStatus::Accepted),
                Attendee::new("alice@example.com", ResponseStatus::Tentative),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_equality_ignores_attendee_order() {
        let a = make_test_event();
        let mut b = make_test_event();
        b.attendees.reverse();

        assert_eq!(a, a);
        assert_eq!(a, b);
        assert_eq!(b, a);
    }

    #[test]
    fn test_equality_ignores_metadata_timestamps() {
        let a = make_test_event();
        let mut b = make_test_event();
        b.created = Some(Utc::now());
        b.last_modified = Some(Utc::now());
        b.action = Some(Action::Update);

        assert_eq!(a, b);
    }

    #[test]
    fn test_equality_detects_content_changes() {
        let a = make_test_event();

        let mut moved = make_test_event();
        moved.end = Some(Utc.with_ymd_and_hms(2024, 1, 3, 9, 30, 0).unwrap());
        assert_ne!(a, moved);

        let mut relocated = make_test_event();
        relocated.location = Some(Location::named("Room 4"));
        assert_ne!(a, relocated);

        let mut replied = make_test_event();
        replied.attendees[0].response_status = ResponseStatus::Declined;
        assert_ne!(a, replied);

        let mut extra = make_test_event();
        extra
            .attendees
            .push(Attendee::new("carol@example.com", ResponseStatus::None));
        assert_ne!(a, extra);
    }

    #[test]
    fn test_action_is_not_serialized() {
        let event = make_test_event().with_action(Action::Add);
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("action"), "got {json}");

        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.action, None);
        assert_eq!(back, event);
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("alice@example.com"));
        assert!(is_valid_email("first.last+tag@sub.example.org"));
        assert!(!is_valid_email("alice"));
        assert!(!is_valid_email("alice@"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("alice @example.com"));

        assert!(Person::new("Alice", "alice@example.com").is_ok());
        assert!(Person::new("Alice", "not-an-email").is_err());
    }

    #[test]
    fn test_display_name_falls_back_to_parts() {
        let person = Person {
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            email: "ada@example.com".to_string(),
            ..Default::default()
        };
        assert_eq!(person.display_name().as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn test_time_span_requires_start_and_end() {
        let mut event = make_test_event();
        assert!(event.time_span().is_ok());

        event.end = None;
        assert!(matches!(
            event.time_span(),
            Err(CalBridgeError::InvalidEvent { .. })
        ));
    }
}
