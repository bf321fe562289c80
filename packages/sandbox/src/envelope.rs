// ABOUTME: Uniform parsed shapes of sandbox gateway replies
// ABOUTME: Sandbox descriptor, raw gateway reply and the success/failure result envelope

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::GatewayError;

/// Business code for a normal reply
pub const SUCCESS_CODE: i64 = 1000;

/// Business code the gateway uses when a sandbox does not exist
pub const NOT_FOUND_CODE: i64 = 4004;

/// Code used for failures produced locally (transport, misuse, configuration)
pub const LOCAL_ERROR_CODE: i64 = -1;

/// Current time as a float UNIX timestamp, the gateway's `created_at` format
pub fn now_timestamp() -> f64 {
    let now = chrono::Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
}

/// Runtime state of a sandbox as reported by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SandboxStatus {
    Running,
    Exited,
    #[default]
    Unknown,
}

impl SandboxStatus {
    /// Parse a gateway status string; anything unrecognized is `Unknown`
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "running" => SandboxStatus::Running,
            "exited" => SandboxStatus::Exited,
            _ => SandboxStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SandboxStatus::Running => "running",
            SandboxStatus::Exited => "exited",
            SandboxStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SandboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SandboxStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SandboxStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::String(status)) => SandboxStatus::parse(&status),
            _ => SandboxStatus::Unknown,
        })
    }
}

/// Identity and runtime facts about one sandbox
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SandboxDescriptor {
    /// Empty until assigned by the gateway
    pub sandbox_id: String,
    pub status: SandboxStatus,
    pub created_at: f64,
    pub ip_address: String,
    /// Gateway-supplied fields not modeled above, passed through verbatim
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl SandboxDescriptor {
    const KNOWN_KEYS: [&'static str; 4] = ["sandbox_id", "status", "created_at", "ip_address"];

    /// Descriptor representing "no sandbox data"
    pub fn empty() -> Self {
        Self {
            sandbox_id: String::new(),
            status: SandboxStatus::Unknown,
            created_at: now_timestamp(),
            ip_address: String::new(),
            extra: HashMap::new(),
        }
    }

    /// Build from a gateway `data` payload; missing or mistyped keys take their defaults
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self::from_map(map),
            _ => Self::empty(),
        }
    }

    fn from_map(map: &Map<String, Value>) -> Self {
        let text = |key: &str| {
            map.get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_default()
        };

        let status = map
            .get("status")
            .and_then(Value::as_str)
            .map(SandboxStatus::parse)
            .unwrap_or_default();

        let created_at = map
            .get("created_at")
            .and_then(|v| v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .unwrap_or_else(now_timestamp);

        let extra = map
            .iter()
            .filter(|(key, _)| !Self::KNOWN_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self {
            sandbox_id: text("sandbox_id"),
            status,
            created_at,
            ip_address: text("ip_address"),
            extra,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sandbox_id.is_empty()
    }
}

impl Default for SandboxDescriptor {
    fn default() -> Self {
        Self::empty()
    }
}

impl<'de> Deserialize<'de> for SandboxDescriptor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

/// Raw decoded gateway reply: `{"code", "message", "data"}` plus the HTTP status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayReply {
    #[serde(skip)]
    pub http_status: u16,
    #[serde(default = "missing_code")]
    pub code: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub message: String,
    #[serde(default)]
    pub data: Value,
}

fn missing_code() -> i64 {
    LOCAL_ERROR_CODE
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl GatewayReply {
    /// HTTP 200 and the normal business code
    pub fn is_success(&self) -> bool {
        self.http_status == 200 && self.code == SUCCESS_CODE
    }

    /// Best available diagnostic for a failed reply
    pub fn diagnostic(&self) -> String {
        if !self.message.trim().is_empty() {
            self.message.clone()
        } else if self.http_status != 200 {
            format!("Gateway returned HTTP {}", self.http_status)
        } else {
            format!("Gateway returned code {}", self.code)
        }
    }
}

/// Outcome of any gateway call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub success: bool,
    pub message: String,
    pub code: i64,
    pub data: SandboxDescriptor,
}

impl ResultEnvelope {
    /// Normalize a decoded reply
    pub fn from_reply(reply: &GatewayReply) -> Self {
        let success = reply.is_success();
        Self {
            success,
            message: if success {
                "Success".to_string()
            } else {
                reply.diagnostic()
            },
            code: reply.code,
            data: SandboxDescriptor::from_value(&reply.data),
        }
    }

    /// Failure produced locally, with no sandbox data
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            code: LOCAL_ERROR_CODE,
            data: SandboxDescriptor::empty(),
        }
    }

    /// Local failure carrying an error's message
    pub fn from_error(err: &GatewayError) -> Self {
        Self::failure(err.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        self.code == NOT_FOUND_CODE
    }

    /// Sandbox status carried by a successful envelope
    pub fn status(&self) -> SandboxStatus {
        if self.success {
            self.data.status
        } else {
            SandboxStatus::Unknown
        }
    }
}
