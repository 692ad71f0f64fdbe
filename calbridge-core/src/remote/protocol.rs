//! Defines the JSON protocol used between calbridge and provider binaries
//! over stdin/stdout.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::CalBridgeError;
use crate::sink_event::SinkEvent;
use crate::source_event::SourceEvent;

pub trait ProviderCommand: Serialize {
    type Response: DeserializeOwned;
    fn command() -> Command;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    VerifySession,
    PullEvents,
    GetEvent,
    ListEvents,
    CreateEvent,
    UpdateEvent,
    DeleteEvent,
}

/// Request sent from calbridge to a provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    pub command: Command,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Response sent from a provider back to calbridge.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response<T> {
    Success { data: T },
    Error { error: String },
}

/// Map a provider error string to an error kind by its prefix.
///
/// Providers report `auth:`, `not_found:`, `conflict:` or `unavailable:`
/// for errors calbridge reacts to; anything else is a plain provider error.
pub fn classify_error(message: &str) -> CalBridgeError {
    let (prefix, rest) = match message.split_once(':') {
        Some((prefix, rest)) => (prefix.trim(), rest.trim().to_string()),
        None => return CalBridgeError::Provider(message.to_string()),
    };

    match prefix {
        "auth" => CalBridgeError::Authentication(rest),
        "not_found" => CalBridgeError::NotFound(rest),
        "conflict" => CalBridgeError::RemoteConflict {
            id: String::new(),
            reason: rest,
        },
        "unavailable" => CalBridgeError::Transient(rest),
        _ => CalBridgeError::Provider(message.to_string()),
    }
}

// ============================================================================
// Session
// ============================================================================

/// Ask the provider whether its stored credentials are still usable.
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifySession {}

impl ProviderCommand for VerifySession {
    type Response = ();
    fn command() -> Command {
        Command::VerifySession
    }
}

// ============================================================================
// Source commands
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct PullEvents {}

impl ProviderCommand for PullEvents {
    type Response = Vec<SourceEvent>;
    fn command() -> Command {
        Command::PullEvents
    }
}

// ============================================================================
// Sink commands
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct GetEvent {
    pub event_id: String,
}

impl ProviderCommand for GetEvent {
    type Response = Option<SinkEvent>;
    fn command() -> Command {
        Command::GetEvent
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListEvents {
    pub calendar_id: String,
}

impl ProviderCommand for ListEvents {
    type Response = Vec<SinkEvent>;
    fn command() -> Command {
        Command::ListEvents
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateEvent {
    pub event: SinkEvent,
}

impl ProviderCommand for CreateEvent {
    type Response = SinkEvent;
    fn command() -> Command {
        Command::CreateEvent
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateEvent {
    pub event: SinkEvent,
    /// Sequence the provider must write; one past the stored value
    pub sequence: i64,
}

impl ProviderCommand for UpdateEvent {
    type Response = SinkEvent;
    fn command() -> Command {
        Command::UpdateEvent
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteEvent {
    pub event_id: String,
}

impl ProviderCommand for DeleteEvent {
    type Response = ();
    fn command() -> Command {
        Command::DeleteEvent
    }
}
