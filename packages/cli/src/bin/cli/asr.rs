// ABOUTME: CLI commands for recording transcription jobs (start, finish, cancel, wait)
// ABOUTME: wait owns the poll-via-finish loop with exponential backoff until a terminal state

use std::time::Duration;

use backoff::{future::retry_notify, ExponentialBackoff, ExponentialBackoffBuilder};
use clap::{Args, Subcommand};
use colored::*;
use sandgate_config::constants::{
    DEFAULT_POLL_MAX_ELAPSED_SECS, DEFAULT_WORKSPACE_DIR, SANDGATE_POLL_MAX_ELAPSED_SECS,
};
use sandgate_config::env_u64;
use sandgate_sandbox::{
    AsrFinishParams, AsrJob, AsrStartParams, AudioConfig, JobResponse, JobTarget, NoteFileConfig,
    RemoteJob, TranscriptFileConfig,
};
use tracing::debug;

use super::utils::report_job;
use super::GatewayArgs;

const MAX_POLL_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Subcommand)]
pub enum AsrCommands {
    /// Start recording/transcribing into a sandbox workspace
    Start(StartArgs),
    /// Commit the job, or poll its progress if already committed
    Finish(FinishArgs),
    /// Cancel a running job
    Cancel(TaskArgs),
    /// Commit the job and poll until it completes, fails or is cancelled
    Wait(WaitArgs),
}

#[derive(Debug, Args)]
pub struct TaskArgs {
    /// Sandbox hosting the job
    pub sandbox_id: String,

    /// Caller-chosen job identifier
    #[arg(long)]
    pub task_key: String,

    /// Scratch directory inside the sandbox
    #[arg(long, default_value = DEFAULT_WORKSPACE_DIR)]
    pub workspace_dir: String,
}

#[derive(Debug, Args)]
pub struct StartArgs {
    #[command(flatten)]
    pub task: TaskArgs,

    /// Directory holding the recorded chunks
    #[arg(long)]
    pub source_dir: String,

    /// Where the sandbox writes the meeting note
    #[arg(long)]
    pub note_source: Option<String>,

    /// Where the sandbox writes the transcript
    #[arg(long)]
    pub transcript_source: Option<String>,
}

#[derive(Debug, Args)]
pub struct OutputArgs {
    /// Directory holding the recorded chunks
    #[arg(long)]
    pub audio_source_dir: String,

    /// Directory receiving the merged recording
    #[arg(long)]
    pub audio_target_dir: String,

    /// File name of the merged recording
    #[arg(long)]
    pub output_filename: String,

    #[arg(long, default_value = "mp3")]
    pub format: String,

    #[arg(long)]
    pub sample_rate: Option<u32>,

    #[arg(long)]
    pub channels: Option<u16>,

    #[arg(long)]
    pub bitrate_kbps: Option<u32>,

    #[arg(long)]
    pub note_source: Option<String>,

    #[arg(long, requires = "note_source")]
    pub note_target_dir: Option<String>,

    #[arg(long, requires = "note_source")]
    pub note_target_filename: Option<String>,

    #[arg(long)]
    pub transcript_source: Option<String>,

    #[arg(long, requires = "transcript_source")]
    pub transcript_target_dir: Option<String>,

    #[arg(long, requires = "transcript_source")]
    pub transcript_target_filename: Option<String>,
}

#[derive(Debug, Args)]
pub struct FinishArgs {
    #[command(flatten)]
    pub task: TaskArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args)]
pub struct WaitArgs {
    #[command(flatten)]
    pub finish: FinishArgs,

    /// First delay between polls, in seconds
    #[arg(long, default_value_t = 2)]
    pub interval_secs: u64,

    /// Give up after this many seconds (defaults to SANDGATE_POLL_MAX_ELAPSED_SECS)
    #[arg(long)]
    pub max_wait_secs: Option<u64>,
}

impl StartArgs {
    fn params(&self) -> AsrStartParams {
        AsrStartParams {
            task_key: self.task.task_key.clone(),
            source_dir: self.source_dir.clone(),
            workspace_dir: self.task.workspace_dir.clone(),
            note_file: self.note_source.as_deref().map(NoteFileConfig::new),
            transcript_file: self.transcript_source.as_deref().map(TranscriptFileConfig::new),
        }
    }
}

impl FinishArgs {
    fn params(&self) -> AsrFinishParams {
        let output = &self.output;

        let mut audio = AudioConfig::new(
            output.audio_source_dir.as_str(),
            output.audio_target_dir.as_str(),
            output.output_filename.as_str(),
        )
        .with_format(output.format.as_str());
        audio.sample_rate = output.sample_rate;
        audio.channels = output.channels;
        audio.bitrate_kbps = output.bitrate_kbps;

        AsrFinishParams {
            task_key: self.task.task_key.clone(),
            workspace_dir: self.task.workspace_dir.clone(),
            audio,
            note_file: output.note_source.as_deref().map(|source| {
                NoteFileConfig::new(source).with_target(
                    output.note_target_dir.clone().unwrap_or_default(),
                    output.note_target_filename.clone().unwrap_or_default(),
                )
            }),
            transcript_file: output.transcript_source.as_deref().map(|source| {
                TranscriptFileConfig::new(source).with_target(
                    output.transcript_target_dir.clone().unwrap_or_default(),
                    output.transcript_target_filename.clone().unwrap_or_default(),
                )
            }),
        }
    }
}

impl WaitArgs {
    fn policy(&self) -> ExponentialBackoff {
        let max_wait = self.max_wait_secs.unwrap_or_else(|| {
            env_u64(SANDGATE_POLL_MAX_ELAPSED_SECS, DEFAULT_POLL_MAX_ELAPSED_SECS)
        });
        poll_policy(
            Duration::from_secs(self.interval_secs.max(1)),
            Duration::from_secs(max_wait),
        )
    }
}

pub async fn handle_asr_command(command: AsrCommands, gateway: &GatewayArgs) -> anyhow::Result<()> {
    let job = AsrJob::new(gateway.proxy()?);

    match command {
        AsrCommands::Start(args) => {
            let response = job.start(&args.task.sandbox_id, &args.params()).await;
            report_job("🎙️  Job started:", &response, gateway.json)
        }

        AsrCommands::Finish(args) => {
            let response = job.finish(&args.task.sandbox_id, &args.params()).await;
            report_job("📝 Job status:", &response, gateway.json)
        }

        AsrCommands::Cancel(args) => {
            let target = JobTarget::new(args.task_key.as_str(), args.workspace_dir.as_str());
            let response = job.cancel(&args.sandbox_id, &target).await;
            report_job("🛑 Job cancel requested:", &response, gateway.json)
        }

        AsrCommands::Wait(args) => {
            let params = args.finish.params();
            let sandbox_id = args.finish.task.sandbox_id.as_str();

            if !gateway.json {
                println!(
                    "⏳ Waiting for task {} in sandbox {}",
                    params.task_key.cyan(),
                    sandbox_id.cyan()
                );
            }

            match wait_for_completion(&job, sandbox_id, &params, args.policy()).await {
                Ok(response) => report_job("✅ Job finished:", &response, gateway.json),
                Err(last) => {
                    report_job("⌛ Still running:", &last, gateway.json)?;
                    anyhow::bail!(
                        "Task {} did not reach a terminal state before the wait limit",
                        params.task_key
                    )
                }
            }
        }
    }
}

/// Exponential poll schedule bounded by a total elapsed time
pub fn poll_policy(initial: Duration, max_elapsed: Duration) -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_initial_interval(initial)
        .with_max_interval(Duration::from_secs(MAX_POLL_INTERVAL_SECS).max(initial))
        .with_max_elapsed_time(Some(max_elapsed))
        .build()
}

/// Re-issue finish with identical arguments until the job is terminal.
///
/// `Ok` carries the terminal response (which may be a failed call); `Err`
/// carries the last non-terminal response once the policy gives up.
pub async fn wait_for_completion(
    job: &AsrJob,
    sandbox_id: &str,
    params: &AsrFinishParams,
    policy: ExponentialBackoff,
) -> Result<JobResponse, JobResponse> {
    retry_notify(
        policy,
        move || async move {
            let response = job.finish(sandbox_id, params).await;
            if response.is_terminal() {
                Ok(response)
            } else {
                Err(backoff::Error::transient(response))
            }
        },
        |response: JobResponse, delay: Duration| {
            debug!(
                sandbox_id,
                task_key = %params.task_key,
                status = %response.status,
                "Job not finished yet, polling again in {:?}",
                delay
            );
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use sandgate_sandbox::{GatewayConfig, GatewayProxy, JobState, SharedConfig};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FINISH_PATH: &str = "/api/v1/sandboxes/sb1/proxy/api/asr/task/finish";

    #[derive(Parser)]
    struct TestCli {
        #[command(subcommand)]
        command: AsrCommands,
    }

    fn finish_args(extra: &[&str]) -> FinishArgs {
        let mut argv = vec![
            "asr",
            "finish",
            "sb1",
            "--task-key",
            "t1",
            "--audio-source-dir",
            "/rec/t1",
            "--audio-target-dir",
            "/out",
            "--output-filename",
            "t1.mp3",
        ];
        argv.extend_from_slice(extra);

        match TestCli::try_parse_from(argv).unwrap().command {
            AsrCommands::Finish(args) => args,
            other => panic!("unexpected command: {:?}", other),
        }
    }

    fn job(base_url: &str) -> AsrJob {
        let config = SharedConfig::new(GatewayConfig::new(base_url, "t")).unwrap();
        AsrJob::new(GatewayProxy::new(config).unwrap())
    }

    fn fast_policy(max_elapsed_ms: u64) -> ExponentialBackoff {
        poll_policy(
            Duration::from_millis(10),
            Duration::from_millis(max_elapsed_ms),
        )
    }

    fn job_reply(status: &str, file_path: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "code": 1000,
            "message": "ok",
            "data": {"status": status, "file_path": file_path}
        }))
    }

    #[test]
    fn test_finish_args_build_full_params() {
        let params = finish_args(&[
            "--sample-rate",
            "16000",
            "--note-source",
            "/ws/note.md",
            "--note-target-dir",
            "/notes",
        ])
        .params();

        assert_eq!(params.workspace_dir, DEFAULT_WORKSPACE_DIR);
        assert_eq!(params.audio.format, "mp3");
        assert_eq!(params.audio.sample_rate, Some(16000));
        assert_eq!(
            params.note_file,
            Some(NoteFileConfig::new("/ws/note.md").with_target("/notes", ""))
        );
        assert_eq!(params.transcript_file, None);
    }

    #[test]
    fn test_note_target_requires_note_source() {
        let result = TestCli::try_parse_from([
            "asr",
            "finish",
            "sb1",
            "--task-key",
            "t1",
            "--audio-source-dir",
            "/rec",
            "--audio-target-dir",
            "/out",
            "--output-filename",
            "a.mp3",
            "--note-target-dir",
            "/notes",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_start_args_send_source_paths() {
        let cli = TestCli::try_parse_from([
            "asr",
            "start",
            "sb1",
            "--task-key",
            "t1",
            "--source-dir",
            "/rec/t1",
            "--transcript-source",
            "/ws/transcript.txt",
        ])
        .unwrap();

        let AsrCommands::Start(args) = cli.command else {
            panic!("expected start");
        };
        let params = args.params();
        assert_eq!(params.source_dir, "/rec/t1");
        assert_eq!(params.note_file, None);
        assert_eq!(
            params.transcript_file,
            Some(TranscriptFileConfig::new("/ws/transcript.txt"))
        );
    }

    #[tokio::test]
    async fn test_wait_polls_until_completed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(FINISH_PATH))
            .respond_with(job_reply("processing", ""))
            .up_to_n_times(2)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(FINISH_PATH))
            .respond_with(job_reply("completed", "/out/t1.mp3"))
            .mount(&server)
            .await;

        let params = finish_args(&[]).params();
        let response = wait_for_completion(&job(&server.uri()), "sb1", &params, fast_policy(5_000))
            .await
            .unwrap();

        assert_eq!(response.state(), JobState::Completed);
        assert_eq!(response.file_path, "/out/t1.mp3");
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_wait_gives_up_after_max_elapsed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(FINISH_PATH))
            .respond_with(job_reply("processing", ""))
            .mount(&server)
            .await;

        let params = finish_args(&[]).params();
        let last = wait_for_completion(&job(&server.uri()), "sb1", &params, fast_policy(200))
            .await
            .unwrap_err();

        assert_eq!(last.state(), JobState::Processing);
    }

    #[tokio::test]
    async fn test_wait_stops_on_failed_call() {
        let job = job("http://127.0.0.1:1");
        let params = finish_args(&[]).params();

        let response = wait_for_completion(&job, "sb1", &params, fast_policy(5_000))
            .await
            .unwrap();

        assert!(!response.is_success());
        assert!(response.message.starts_with("Unexpected error:"));
    }
}
