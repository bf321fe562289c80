// ABOUTME: Job trait and shared response model for long-running jobs inside a sandbox
// ABOUTME: Job state lives in the sandbox; this layer re-derives progress from each reply

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::envelope::{GatewayReply, ResultEnvelope, LOCAL_ERROR_CODE, SUCCESS_CODE};
use crate::error::GatewayError;
use crate::proxy::{GatewayProxy, ProxyRequest};

pub mod asr;

pub use asr::{AsrJob, AudioConfig, NoteFileConfig, TranscriptFileConfig};

/// Coarse classification of the free-form job status string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Processing,
    Completed,
    Error,
    Cancelled,
    Other(String),
}

impl JobState {
    pub fn parse(status: &str) -> Self {
        match status.trim().to_lowercase().as_str() {
            "processing" | "running" | "pending" | "started" | "finishing" => JobState::Processing,
            "completed" | "finished" | "success" => JobState::Completed,
            "error" | "failed" => JobState::Error,
            "cancelled" | "canceled" => JobState::Cancelled,
            _ => JobState::Other(status.to_string()),
        }
    }

    /// Completed, Error and Cancelled never change again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Error | JobState::Cancelled
        )
    }
}

/// Parsed reply for a job call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResponse {
    pub code: i64,
    pub message: String,
    /// Free-form upstream status such as `processing`, `completed` or `error`
    pub status: String,
    /// Populated once the artifact is written
    pub file_path: String,
    /// Raw `data` payload for job-specific fields
    #[serde(default)]
    pub data: Value,
}

impl JobResponse {
    /// Normalize a raw `{code, message, data}` reply
    pub fn from_reply(reply: &GatewayReply) -> Self {
        let success = reply.is_success();
        // a 5xx carrying the normal code is still a failure
        let code = if !success && reply.code == SUCCESS_CODE {
            LOCAL_ERROR_CODE
        } else {
            reply.code
        };

        Self {
            code,
            message: if success {
                reply.message.clone()
            } else {
                reply.diagnostic()
            },
            status: text_field(&reply.data, "status"),
            file_path: text_field(&reply.data, "file_path"),
            data: reply.data.clone(),
        }
    }

    /// Normalize a lifecycle envelope into the same shape
    pub fn from_envelope(envelope: &ResultEnvelope) -> Self {
        let file_path = envelope
            .data
            .extra
            .get("file_path")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Self {
            code: if envelope.success {
                SUCCESS_CODE
            } else if envelope.code == SUCCESS_CODE {
                LOCAL_ERROR_CODE
            } else {
                envelope.code
            },
            message: envelope.message.clone(),
            status: if envelope.success {
                envelope.data.status.as_str().to_string()
            } else {
                String::new()
            },
            file_path,
            data: serde_json::to_value(&envelope.data).unwrap_or(Value::Null),
        }
    }

    /// Local failure: construction, misuse or transport
    pub fn from_error(err: &GatewayError) -> Self {
        Self {
            code: LOCAL_ERROR_CODE,
            message: format!("Unexpected error: {}", err),
            status: String::new(),
            file_path: String::new(),
            data: Value::Null,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    pub fn state(&self) -> JobState {
        JobState::parse(&self.status)
    }

    /// A failed call or a terminal job state ends a poll loop
    pub fn is_terminal(&self) -> bool {
        !self.is_success() || self.state().is_terminal()
    }
}

fn text_field(data: &Value, key: &str) -> String {
    data.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Identifies one job inside a sandbox
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobTarget {
    pub task_key: String,
    pub workspace_dir: String,
}

impl JobTarget {
    pub fn new(task_key: impl Into<String>, workspace_dir: impl Into<String>) -> Self {
        Self {
            task_key: task_key.into(),
            workspace_dir: workspace_dir.into(),
        }
    }
}

/// A kind of long-running job hosted inside a sandbox.
///
/// Implementations are stateless pass-throughs: they neither deduplicate
/// `start` nor sequence concurrent calls for the same task. `finish` is both
/// the commit and the poll; callers re-issue it with identical arguments
/// until the response is terminal.
#[async_trait]
pub trait RemoteJob: Send + Sync {
    type StartParams: Send + Sync;
    type FinishParams: Send + Sync;

    /// Short job kind name used in logs
    fn kind(&self) -> &'static str;

    async fn start(&self, sandbox_id: &str, params: &Self::StartParams) -> JobResponse;

    async fn finish(&self, sandbox_id: &str, params: &Self::FinishParams) -> JobResponse;

    async fn cancel(&self, sandbox_id: &str, target: &JobTarget) -> JobResponse;
}

/// Forward one job call into the sandbox and normalize the reply
pub(crate) async fn dispatch<B: Serialize + ?Sized>(
    proxy: &GatewayProxy,
    sandbox_id: &str,
    path: &str,
    task_key: &str,
    body: &B,
) -> JobResponse {
    if task_key.trim().is_empty() {
        return JobResponse::from_error(&GatewayError::invalid_request("task_key is required"));
    }

    let body = match serde_json::to_value(body) {
        Ok(body) => body,
        Err(e) => {
            return JobResponse::from_error(&GatewayError::invalid_request(format!(
                "Failed to serialize job request: {}",
                e
            )))
        }
    };

    match proxy
        .forward(sandbox_id, &ProxyRequest::post(path).json(body))
        .await
    {
        Ok(reply) => {
            let response = JobResponse::from_reply(&reply);
            if response.is_success() {
                debug!(
                    sandbox_id,
                    task_key,
                    path,
                    status = %response.status,
                    "Job call succeeded"
                );
            } else {
                warn!(
                    sandbox_id,
                    task_key,
                    path,
                    code = response.code,
                    "Job call rejected by sandbox: {}",
                    response.message
                );
            }
            response
        }
        Err(e) => {
            warn!(sandbox_id, task_key, path, "Job call failed: {}", e);
            JobResponse::from_error(&e)
        }
    }
}
