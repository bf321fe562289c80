// ABOUTME: Audio recording transcription job running inside an ASR sandbox
// ABOUTME: Start sends source paths only; finish commits and polls with the full output configs

use async_trait::async_trait;
use sandgate_config::constants::DEFAULT_WORKSPACE_DIR;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{dispatch, JobResponse, JobTarget, RemoteJob};
use crate::error::GatewayError;
use crate::proxy::GatewayProxy;
use crate::routes;

/// Where the merged recording goes and how it is encoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Directory holding the recorded chunks
    pub source_dir: String,
    pub target_dir: String,
    pub output_filename: String,
    /// Container/codec, e.g. `mp3` or `wav`
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate_kbps: Option<u32>,
}

impl AudioConfig {
    pub fn new(
        source_dir: impl Into<String>,
        target_dir: impl Into<String>,
        output_filename: impl Into<String>,
    ) -> Self {
        Self {
            source_dir: source_dir.into(),
            target_dir: target_dir.into(),
            output_filename: output_filename.into(),
            format: "mp3".to_string(),
            sample_rate: None,
            channels: None,
            bitrate_kbps: None,
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = Some(sample_rate);
        self
    }

    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels = Some(channels);
        self
    }

    pub fn with_bitrate_kbps(mut self, bitrate_kbps: u32) -> Self {
        self.bitrate_kbps = Some(bitrate_kbps);
        self
    }
}

/// Destination for the generated meeting note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteFileConfig {
    pub source_path: String,
    #[serde(default)]
    pub target_dir: String,
    #[serde(default)]
    pub target_filename: String,
}

impl NoteFileConfig {
    pub fn new(source_path: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            target_dir: String::new(),
            target_filename: String::new(),
        }
    }

    pub fn with_target(
        mut self,
        target_dir: impl Into<String>,
        target_filename: impl Into<String>,
    ) -> Self {
        self.target_dir = target_dir.into();
        self.target_filename = target_filename.into();
        self
    }
}

/// Destination for the streaming transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptFileConfig {
    pub source_path: String,
    #[serde(default)]
    pub target_dir: String,
    #[serde(default)]
    pub target_filename: String,
}

impl TranscriptFileConfig {
    pub fn new(source_path: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            target_dir: String::new(),
            target_filename: String::new(),
        }
    }

    pub fn with_target(
        mut self,
        target_dir: impl Into<String>,
        target_filename: impl Into<String>,
    ) -> Self {
        self.target_dir = target_dir.into();
        self.target_filename = target_filename.into();
        self
    }
}

/// Path-only form of a file config, sent at start
#[derive(Debug, Serialize)]
struct SourcePath<'a> {
    source_path: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AsrStartParams {
    pub task_key: String,
    pub source_dir: String,
    pub workspace_dir: String,
    pub note_file: Option<NoteFileConfig>,
    pub transcript_file: Option<TranscriptFileConfig>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AsrFinishParams {
    pub task_key: String,
    pub workspace_dir: String,
    pub audio: AudioConfig,
    pub note_file: Option<NoteFileConfig>,
    pub transcript_file: Option<TranscriptFileConfig>,
}

#[derive(Debug, Serialize)]
struct StartBody<'a> {
    task_key: &'a str,
    source_dir: &'a str,
    workspace_dir: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    note_file: Option<SourcePath<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    transcript_file: Option<SourcePath<'a>>,
}

#[derive(Debug, Serialize)]
struct FinishBody<'a> {
    task_key: &'a str,
    workspace_dir: &'a str,
    audio: &'a AudioConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    note_file: Option<&'a NoteFileConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    transcript_file: Option<&'a TranscriptFileConfig>,
}

#[derive(Debug, Serialize)]
struct CancelBody<'a> {
    task_key: &'a str,
    workspace_dir: &'a str,
}

fn workspace_or_default(workspace_dir: &str) -> &str {
    if workspace_dir.trim().is_empty() {
        DEFAULT_WORKSPACE_DIR
    } else {
        workspace_dir
    }
}

impl AsrStartParams {
    fn body(&self) -> StartBody<'_> {
        StartBody {
            task_key: &self.task_key,
            source_dir: &self.source_dir,
            workspace_dir: workspace_or_default(&self.workspace_dir),
            note_file: self.note_file.as_ref().map(|note| SourcePath {
                source_path: &note.source_path,
            }),
            transcript_file: self.transcript_file.as_ref().map(|transcript| SourcePath {
                source_path: &transcript.source_path,
            }),
        }
    }
}

impl AsrFinishParams {
    fn body(&self) -> FinishBody<'_> {
        FinishBody {
            task_key: &self.task_key,
            workspace_dir: workspace_or_default(&self.workspace_dir),
            audio: &self.audio,
            note_file: self.note_file.as_ref(),
            transcript_file: self.transcript_file.as_ref(),
        }
    }
}

/// Recording transcription job.
///
/// State machine per `(sandbox_id, task_key)`, held inside the sandbox:
/// `NotStarted -> Running -> {Finishing -> Completed | Error} | Cancelled`.
#[derive(Clone)]
pub struct AsrJob {
    proxy: GatewayProxy,
}

impl AsrJob {
    pub fn new(proxy: GatewayProxy) -> Self {
        Self { proxy }
    }

    /// Begin recording/transcribing. The sandbox must already be running.
    pub async fn start_job(
        &self,
        sandbox_id: &str,
        task_key: &str,
        source_dir: &str,
        workspace_dir: &str,
        note_file: Option<NoteFileConfig>,
        transcript_file: Option<TranscriptFileConfig>,
    ) -> JobResponse {
        let params = AsrStartParams {
            task_key: task_key.to_string(),
            source_dir: source_dir.to_string(),
            workspace_dir: workspace_dir.to_string(),
            note_file,
            transcript_file,
        };
        self.start(sandbox_id, &params).await
    }

    /// Trigger finalization on first call, poll its progress on every later call
    pub async fn finish_job(
        &self,
        sandbox_id: &str,
        task_key: &str,
        workspace_dir: &str,
        audio: AudioConfig,
        note_file: Option<NoteFileConfig>,
        transcript_file: Option<TranscriptFileConfig>,
    ) -> JobResponse {
        let params = AsrFinishParams {
            task_key: task_key.to_string(),
            workspace_dir: workspace_dir.to_string(),
            audio,
            note_file,
            transcript_file,
        };
        self.finish(sandbox_id, &params).await
    }

    /// Best-effort cancellation
    pub async fn cancel_job(
        &self,
        sandbox_id: &str,
        task_key: &str,
        workspace_dir: &str,
    ) -> JobResponse {
        self.cancel(sandbox_id, &JobTarget::new(task_key, workspace_dir))
            .await
    }
}

#[async_trait]
impl RemoteJob for AsrJob {
    type StartParams = AsrStartParams;
    type FinishParams = AsrFinishParams;

    fn kind(&self) -> &'static str {
        "asr"
    }

    async fn start(&self, sandbox_id: &str, params: &AsrStartParams) -> JobResponse {
        if params.source_dir.trim().is_empty() {
            return JobResponse::from_error(&GatewayError::invalid_request(
                "source_dir is required",
            ));
        }

        info!(
            sandbox_id,
            task_key = %params.task_key,
            kind = self.kind(),
            "Starting job"
        );
        dispatch(
            &self.proxy,
            sandbox_id,
            routes::ASR_TASK_START,
            &params.task_key,
            &params.body(),
        )
        .await
    }

    async fn finish(&self, sandbox_id: &str, params: &AsrFinishParams) -> JobResponse {
        let response = dispatch(
            &self.proxy,
            sandbox_id,
            routes::ASR_TASK_FINISH,
            &params.task_key,
            &params.body(),
        )
        .await;

        if response.is_success() && response.state().is_terminal() {
            info!(
                sandbox_id,
                task_key = %params.task_key,
                status = %response.status,
                file_path = %response.file_path,
                "Job reached terminal state"
            );
        }
        response
    }

    async fn cancel(&self, sandbox_id: &str, target: &JobTarget) -> JobResponse {
        info!(
            sandbox_id,
            task_key = %target.task_key,
            kind = self.kind(),
            "Cancelling job"
        );
        let body = CancelBody {
            task_key: &target.task_key,
            workspace_dir: workspace_or_default(&target.workspace_dir),
        };
        dispatch(
            &self.proxy,
            sandbox_id,
            routes::ASR_TASK_CANCEL,
            &target.task_key,
            &body,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn note() -> NoteFileConfig {
        NoteFileConfig::new("/recordings/t1/note.md").with_target("/notes", "meeting.md")
    }

    fn transcript() -> TranscriptFileConfig {
        TranscriptFileConfig::new("/recordings/t1/transcript.txt")
            .with_target("/transcripts", "meeting.txt")
    }

    #[test]
    fn test_start_body_sends_source_paths_only() {
        let params = AsrStartParams {
            task_key: "t1".to_string(),
            source_dir: "/audio/chunks".to_string(),
            workspace_dir: ".workspace".to_string(),
            note_file: Some(note()),
            transcript_file: Some(transcript()),
        };

        assert_eq!(
            serde_json::to_value(params.body()).unwrap(),
            json!({
                "task_key": "t1",
                "source_dir": "/audio/chunks",
                "workspace_dir": ".workspace",
                "note_file": {"source_path": "/recordings/t1/note.md"},
                "transcript_file": {"source_path": "/recordings/t1/transcript.txt"}
            })
        );
    }

    #[test]
    fn test_start_body_omits_missing_file_configs() {
        let params = AsrStartParams {
            task_key: "t1".to_string(),
            source_dir: "/audio/chunks".to_string(),
            workspace_dir: String::new(),
            note_file: None,
            transcript_file: None,
        };

        assert_eq!(
            serde_json::to_value(params.body()).unwrap(),
            json!({
                "task_key": "t1",
                "source_dir": "/audio/chunks",
                "workspace_dir": ".workspace"
            })
        );
    }

    #[test]
    fn test_finish_body_sends_full_configs() {
        let params = AsrFinishParams {
            task_key: "t1".to_string(),
            workspace_dir: ".workspace".to_string(),
            audio: AudioConfig::new("/audio/chunks", "/audio/out", "meeting.mp3")
                .with_sample_rate(16000)
                .with_channels(1),
            note_file: Some(note()),
            transcript_file: None,
        };

        assert_eq!(
            serde_json::to_value(params.body()).unwrap(),
            json!({
                "task_key": "t1",
                "workspace_dir": ".workspace",
                "audio": {
                    "source_dir": "/audio/chunks",
                    "target_dir": "/audio/out",
                    "output_filename": "meeting.mp3",
                    "format": "mp3",
                    "sample_rate": 16000,
                    "channels": 1
                },
                "note_file": {
                    "source_path": "/recordings/t1/note.md",
                    "target_dir": "/notes",
                    "target_filename": "meeting.md"
                }
            })
        );
    }

    #[test]
    fn test_audio_config_optional_fields_default_to_none() {
        let audio: AudioConfig = serde_json::from_value(json!({
            "source_dir": "a",
            "target_dir": "b",
            "output_filename": "c.wav",
            "format": "wav"
        }))
        .unwrap();
        assert_eq!(audio.sample_rate, None);
        assert_eq!(audio, AudioConfig::new("a", "b", "c.wav").with_format("wav"));
    }
}
