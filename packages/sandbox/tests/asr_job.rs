// ABOUTME: Integration tests for the ASR job protocol against a mock sandbox
// ABOUTME: Tests start, poll-via-finish, cancellation and failure normalization

use pretty_assertions::assert_eq;
use sandgate_sandbox::{
    AsrJob, AudioConfig, GatewayConfig, GatewayProxy, JobState, NoteFileConfig, SharedConfig,
    TranscriptFileConfig,
};
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "asr-token";
const SANDBOX_ID: &str = "sb1";
const TASK_KEY: &str = "meeting-42";

const START_PATH: &str = "/api/v1/sandboxes/sb1/proxy/api/asr/task/start";
const FINISH_PATH: &str = "/api/v1/sandboxes/sb1/proxy/api/asr/task/finish";
const CANCEL_PATH: &str = "/api/v1/sandboxes/sb1/proxy/api/asr/task/cancel";

fn setup_job(base_url: &str) -> AsrJob {
    let config = SharedConfig::new(GatewayConfig::new(base_url, TOKEN))
        .expect("Failed to build shared config");
    AsrJob::new(GatewayProxy::new(config).expect("Failed to build proxy"))
}

fn audio() -> AudioConfig {
    AudioConfig::new("/rec/meeting-42", "/out", "meeting-42.mp3").with_sample_rate(16000)
}

fn job_reply(status: &str, file_path: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "code": 1000,
        "message": "ok",
        "data": {"status": status, "file_path": file_path}
    }))
}

async fn finish(job: &AsrJob) -> sandgate_sandbox::JobResponse {
    job.finish_job(
        SANDBOX_ID,
        TASK_KEY,
        "/ws",
        audio(),
        Some(NoteFileConfig::new("/ws/note.md").with_target("/out", "note.md")),
        None,
    )
    .await
}

#[tokio::test]
async fn test_start_sends_source_paths_only() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(START_PATH))
        .and(header("token", TOKEN))
        .and(body_json(json!({
            "task_key": TASK_KEY,
            "source_dir": "/rec/meeting-42",
            "workspace_dir": "/ws",
            "note_file": {"source_path": "/ws/note.md"},
            "transcript_file": {"source_path": "/ws/transcript.txt"}
        })))
        .respond_with(job_reply("processing", ""))
        .expect(1)
        .mount(&server)
        .await;

    let job = setup_job(&server.uri());
    let response = job
        .start_job(
            SANDBOX_ID,
            TASK_KEY,
            "/rec/meeting-42",
            "/ws",
            Some(NoteFileConfig::new("/ws/note.md").with_target("/out", "note.md")),
            Some(TranscriptFileConfig::new("/ws/transcript.txt")),
        )
        .await;

    assert!(response.is_success(), "start failed: {}", response.message);
    assert_eq!(response.state(), JobState::Processing);
    assert!(!response.is_terminal());
}

#[tokio::test]
async fn test_finish_polls_until_completed_and_stays_stable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(START_PATH))
        .respond_with(job_reply("processing", ""))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(FINISH_PATH))
        .respond_with(job_reply("processing", ""))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(FINISH_PATH))
        .and(body_partial_json(json!({
            "task_key": TASK_KEY,
            "workspace_dir": "/ws",
            "audio": {
                "source_dir": "/rec/meeting-42",
                "target_dir": "/out",
                "output_filename": "meeting-42.mp3",
                "format": "mp3",
                "sample_rate": 16000
            },
            "note_file": {"source_path": "/ws/note.md", "target_dir": "/out", "target_filename": "note.md"}
        })))
        .respond_with(job_reply("completed", "/out/meeting-42.mp3"))
        .mount(&server)
        .await;

    let job = setup_job(&server.uri());
    let started = job
        .start_job(SANDBOX_ID, TASK_KEY, "/rec/meeting-42", "/ws", None, None)
        .await;
    assert!(started.is_success());

    let mut polls = Vec::new();
    let mut last = finish(&job).await;
    polls.push(last.state());
    while !last.is_terminal() && polls.len() < 10 {
        last = finish(&job).await;
        polls.push(last.state());
    }

    assert_eq!(
        polls,
        vec![JobState::Processing, JobState::Processing, JobState::Completed]
    );
    assert_eq!(last.file_path, "/out/meeting-42.mp3");

    // finishing an already finished job reports the same outcome
    let again = finish(&job).await;
    let once_more = finish(&job).await;
    assert_eq!(again.status, last.status);
    assert_eq!(again.file_path, last.file_path);
    assert_eq!(once_more.status, last.status);
    assert_eq!(once_more.file_path, last.file_path);
}

#[tokio::test]
async fn test_cancel_mid_run_is_never_completed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(FINISH_PATH))
        .respond_with(job_reply("processing", ""))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(CANCEL_PATH))
        .and(body_json(json!({"task_key": TASK_KEY, "workspace_dir": "/ws"})))
        .respond_with(job_reply("cancelled", ""))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(FINISH_PATH))
        .respond_with(job_reply("cancelled", ""))
        .mount(&server)
        .await;

    let job = setup_job(&server.uri());

    let polling = finish(&job).await;
    assert_eq!(polling.state(), JobState::Processing);

    let cancelled = job.cancel_job(SANDBOX_ID, TASK_KEY, "/ws").await;
    assert!(cancelled.is_success());
    assert_eq!(cancelled.state(), JobState::Cancelled);

    let after = finish(&job).await;
    assert_ne!(after.state(), JobState::Completed);
    assert_eq!(after.state(), JobState::Cancelled);
    assert!(after.is_terminal());
}

#[tokio::test]
async fn test_empty_workspace_dir_uses_default() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CANCEL_PATH))
        .and(body_json(json!({"task_key": TASK_KEY, "workspace_dir": ".workspace"})))
        .respond_with(job_reply("cancelled", ""))
        .expect(1)
        .mount(&server)
        .await;

    let job = setup_job(&server.uri());
    let response = job.cancel_job(SANDBOX_ID, TASK_KEY, "").await;
    assert!(response.is_success());
}

#[tokio::test]
async fn test_business_error_keeps_upstream_code() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(FINISH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 3001,
            "message": "task meeting-42 not found",
            "data": {}
        })))
        .mount(&server)
        .await;

    let job = setup_job(&server.uri());
    let response = finish(&job).await;

    assert!(!response.is_success());
    assert_eq!(response.code, 3001);
    assert_eq!(response.message, "task meeting-42 not found");
    assert!(response.is_terminal());
}

#[tokio::test]
async fn test_job_calls_survive_unreachable_gateway() {
    let job = setup_job("http://127.0.0.1:1");

    let started = job
        .start_job(SANDBOX_ID, TASK_KEY, "/rec", "/ws", None, None)
        .await;
    let finished = finish(&job).await;
    let cancelled = job.cancel_job(SANDBOX_ID, TASK_KEY, "/ws").await;

    for response in [&started, &finished, &cancelled] {
        assert_eq!(response.code, -1);
        assert!(
            response.message.starts_with("Unexpected error:"),
            "unexpected message: {}",
            response.message
        );
        assert_eq!(response.status, "");
        assert_eq!(response.file_path, "");
    }
}

#[tokio::test]
async fn test_misuse_is_rejected_before_network() {
    let server = MockServer::start().await;
    let job = setup_job(&server.uri());

    let no_task = job.cancel_job(SANDBOX_ID, "", "/ws").await;
    let no_sandbox = job.cancel_job("", TASK_KEY, "/ws").await;
    let no_source = job
        .start_job(SANDBOX_ID, TASK_KEY, "", "/ws", None, None)
        .await;

    for response in [&no_task, &no_sandbox, &no_source] {
        assert_eq!(response.code, -1);
        assert!(response.message.starts_with("Unexpected error: Invalid request"));
    }

    let requests = server.received_requests().await.unwrap();
    assert!(requests.is_empty());
}
