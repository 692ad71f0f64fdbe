//! Provider subprocess client.
//!
//! A provider is any executable named `calbridge-provider-<name>` on PATH that
//! reads one JSON [`Request`] line from stdin and answers with one JSON
//! [`Response`] on stdout. Providers own their credentials; calbridge only
//! forwards the parameters from its config.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as TokioCommand;
use tracing::debug;

use crate::error::{CalBridgeError, CalBridgeResult};
use crate::remote::protocol::{
    self, Command, CreateEvent, DeleteEvent, GetEvent, ListEvents, ProviderCommand, PullEvents,
    Request, Response, UpdateEvent, VerifySession,
};
use crate::remote::{EventSink, EventSource};
use crate::sink_event::SinkEvent;
use crate::source_event::SourceEvent;

#[derive(Clone, Debug)]
pub struct Provider {
    name: String,
    params: serde_json::Map<String, serde_json::Value>,
}

impl Provider {
    pub fn new(name: &str, params: serde_json::Map<String, serde_json::Value>) -> Self {
        Provider {
            name: name.to_string(),
            params,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn binary_name(&self) -> String {
        format!("calbridge-provider-{}", self.name)
    }

    fn binary_path(&self) -> CalBridgeResult<PathBuf> {
        let binary_name = self.binary_name();
        which::which(&binary_name).map_err(|_| CalBridgeError::ProviderNotInstalled(binary_name))
    }

    /// Call a typed provider command and return its typed response.
    pub async fn call<C: ProviderCommand>(&self, cmd: C) -> CalBridgeResult<C::Response> {
        self.call_raw(C::command(), cmd).await
    }

    /// Build request params: the command's own fields over the configured ones.
    fn build_params<P: Serialize>(&self, params: P) -> CalBridgeResult<serde_json::Value> {
        let mut merged = self.params.clone();
        match serde_json::to_value(params)
            .map_err(|e| CalBridgeError::Serialization(e.to_string()))?
        {
            serde_json::Value::Object(own) => merged.extend(own),
            serde_json::Value::Null => {}
            other => {
                return Err(CalBridgeError::Serialization(format!(
                    "command params must be an object, got {other}"
                )));
            }
        }
        Ok(serde_json::Value::Object(merged))
    }

    async fn call_raw<P: Serialize, R: DeserializeOwned>(
        &self,
        command: Command,
        params: P,
    ) -> CalBridgeResult<R> {
        let request = Request {
            command,
            params: self.build_params(params)?,
        };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| CalBridgeError::Serialization(e.to_string()))?;

        let binary_path = self.binary_path()?;
        debug!(provider = %self.name, ?command, "calling provider");

        let mut child = TokioCommand::new(&binary_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                CalBridgeError::Provider(format!("Failed to spawn {}: {}", binary_path.display(), e))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| CalBridgeError::Provider("provider stdin unavailable".into()))?;
        stdin
            .write_all(format!("{request_json}\n").as_bytes())
            .await?;
        drop(stdin);

        let output = child.wait_with_output().await?;

        if !output.status.success() {
            return Err(CalBridgeError::Provider(format!(
                "Provider exited with status: {}",
                output.status.code().unwrap_or(-1)
            )));
        }

        let response_str = String::from_utf8_lossy(&output.stdout);
        if response_str.trim().is_empty() {
            return Err(CalBridgeError::Provider("Provider returned no response".into()));
        }

        parse_response(&response_str)
    }
}

fn parse_response<R: DeserializeOwned>(raw: &str) -> CalBridgeResult<R> {
    let response: Response<R> = serde_json::from_str(raw.trim())
        .map_err(|e| CalBridgeError::Provider(format!("Failed to parse response: {}", e)))?;

    match response {
        Response::Success { data } => Ok(data),
        Response::Error { error } => Err(protocol::classify_error(&error)),
    }
}

#[async_trait]
impl EventSource for Provider {
    async fn verify_session(&self) -> CalBridgeResult<()> {
        self.call(VerifySession {}).await
    }

    async fn pull(&self) -> CalBridgeResult<Vec<SourceEvent>> {
        self.call(PullEvents {}).await
    }
}

#[async_trait]
impl EventSink for Provider {
    async fn verify_session(&self) -> CalBridgeResult<()> {
        self.call(VerifySession {}).await
    }

    async fn get(&self, remote_id: &str) -> CalBridgeResult<Option<SinkEvent>> {
        self.call(GetEvent {
            event_id: remote_id.to_string(),
        })
        .await
    }

    async fn create(&self, event: &SinkEvent) -> CalBridgeResult<SinkEvent> {
        self.call(CreateEvent {
            event: event.clone(),
        })
        .await
    }

    async fn update(&self, event: &SinkEvent, sequence: i64) -> CalBridgeResult<SinkEvent> {
        self.call(UpdateEvent {
            event: event.clone(),
            sequence,
        })
        .await
        .map_err(|e| match e {
            CalBridgeError::RemoteConflict { reason, .. } => CalBridgeError::RemoteConflict {
                id: event.id.clone(),
                reason,
            },
            other => other,
        })
    }

    async fn delete(&self, remote_id: &str) -> CalBridgeResult<()> {
        self.call(DeleteEvent {
            event_id: remote_id.to_string(),
        })
        .await
    }

    async fn list(&self, calendar_id: &str) -> CalBridgeResult<Vec<SinkEvent>> {
        self.call(ListEvents {
            calendar_id: calendar_id.to_string(),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> serde_json::Map<String, serde_json::Value> {
        let mut params = serde_json::Map::new();
        params.insert("account".into(), "me@example.com".into());
        params.insert("calendar_id".into(), "primary".into());
        params
    }

    #[test]
    fn test_command_params_override_config() {
        let provider = Provider::new("google", params());
        let merged = provider
            .build_params(ListEvents {
                calendar_id: "work".to_string(),
            })
            .unwrap();

        assert_eq!(merged["account"], "me@example.com");
        assert_eq!(merged["calendar_id"], "work");
    }

    #[test]
    fn test_unit_params_keep_config() {
        let provider = Provider::new("outlook", params());
        let merged = provider.build_params(PullEvents {}).unwrap();
        assert_eq!(merged.as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_binary_name() {
        assert_eq!(
            Provider::new("google", Default::default()).binary_name(),
            "calbridge-provider-google"
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_reported() {
        let provider = Provider::new("does-not-exist-anywhere", Default::default());
        let err = EventSource::pull(&provider).await.unwrap_err();
        assert!(matches!(err, CalBridgeError::ProviderNotInstalled(_)));
    }

    #[test]
    fn test_parse_response_maps_errors() {
        let ok: Vec<SinkEvent> = parse_response(r#"{"status":"success","data":[]}"#).unwrap();
        assert!(ok.is_empty());

        let err = parse_response::<()>(r#"{"status":"error","error":"auth: expired"}"#).unwrap_err();
        assert!(matches!(err, CalBridgeError::Authentication(_)));

        assert!(parse_response::<()>("not json").is_err());
    }
}
