//! calbridge configuration at ~/.config/calbridge/config.toml

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{CalBridgeError, CalBridgeResult};
use crate::remote::Provider;
use crate::retry::RemotePolicy;

const MAX_RETRIES: u32 = 10;

fn default_interval_secs() -> u64 {
    300
}

fn default_time_zone() -> String {
    "UTC".to_string()
}

fn default_calendar_id() -> String {
    "primary".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Seconds between the end of one cycle and the start of the next
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// IANA zone used to annotate start/end on the sink
    #[serde(default = "default_time_zone")]
    pub time_zone: String,

    /// Where the snapshot lives; defaults to the platform data dir
    pub state_dir: Option<String>,

    pub source: SourceConfig,
    pub sink: SinkConfig,

    #[serde(default)]
    pub remote: RemoteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub provider: String,
    /// Passed verbatim to the provider
    #[serde(flatten)]
    pub params: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    pub provider: String,
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
    #[serde(flatten)]
    pub params: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        let policy = RemotePolicy::default();
        RemoteConfig {
            timeout_secs: policy.timeout.as_secs(),
            max_retries: policy.max_retries,
            retry_base_delay_ms: policy.base_delay.as_millis() as u64,
        }
    }
}

impl Config {
    pub fn default_path() -> CalBridgeResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CalBridgeError::Config("Could not determine config directory".into()))?
            .join("calbridge");

        Ok(config_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> CalBridgeResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CalBridgeError::Config(format!("Could not read {}: {e}", path.display()))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> CalBridgeResult<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| CalBridgeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> CalBridgeResult<()> {
        self.time_zone()?;
        if self.interval_secs == 0 {
            return Err(CalBridgeError::Config("interval_secs must be positive".into()));
        }
        if self.remote.max_retries > MAX_RETRIES {
            return Err(CalBridgeError::Config(format!(
                "remote.max_retries must be at most {MAX_RETRIES}"
            )));
        }
        if self.remote.timeout_secs == 0 {
            return Err(CalBridgeError::Config(
                "remote.timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn time_zone(&self) -> CalBridgeResult<Tz> {
        self.time_zone
            .parse()
            .map_err(|_| CalBridgeError::Config(format!("Unknown time zone '{}'", self.time_zone)))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn remote_policy(&self) -> RemotePolicy {
        RemotePolicy {
            timeout: Duration::from_secs(self.remote.timeout_secs),
            max_retries: self.remote.max_retries,
            base_delay: Duration::from_millis(self.remote.retry_base_delay_ms),
        }
    }

    pub fn state_dir(&self) -> CalBridgeResult<PathBuf> {
        match &self.state_dir {
            Some(dir) => Ok(PathBuf::from(shellexpand::tilde(dir).as_ref())),
            None => Ok(dirs::data_dir()
                .ok_or_else(|| CalBridgeError::Config("Could not determine data directory".into()))?
                .join("calbridge")),
        }
    }

    pub fn snapshot_dir(&self) -> CalBridgeResult<PathBuf> {
        Ok(self.state_dir()?.join("snapshot"))
    }

    pub fn source_provider(&self) -> Provider {
        Provider::new(&self.source.provider, to_json_params(&self.source.params))
    }

    pub fn sink_provider(&self) -> Provider {
        let mut params = to_json_params(&self.sink.params);
        params.insert(
            "calendar_id".to_string(),
            serde_json::Value::String(self.sink.calendar_id.clone()),
        );
        Provider::new(&self.sink.provider, params)
    }

    /// Write a starter config with the optional settings commented out.
    pub fn create_default(path: &Path) -> CalBridgeResult<()> {
        let contents = format!(
            "\
# calbridge configuration

# Seconds to wait after a cycle finishes before starting the next one:
# interval_secs = {interval}

# Time zone used for start/end on the sink calendar:
# time_zone = \"{tz}\"

# Where the sync snapshot is kept:
# state_dir = \"~/.local/share/calbridge\"

[source]
provider = \"outlook\"

[sink]
provider = \"google\"
calendar_id = \"{calendar}\"

# [remote]
# timeout_secs = 30
# max_retries = 3
# retry_base_delay_ms = 500
",
            interval = default_interval_secs(),
            tz = default_time_zone(),
            calendar = default_calendar_id(),
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CalBridgeError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| CalBridgeError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }
}

fn to_json_params(
    params: &BTreeMap<String, toml::Value>,
) -> serde_json::Map<String, serde_json::Value> {
    params
        .iter()
        .filter_map(|(key, value)| {
            serde_json::to_value(value)
                .ok()
                .map(|json| (key.clone(), json))
        })
        .collect()
}
