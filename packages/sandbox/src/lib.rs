// ABOUTME: Remote sandbox lifecycle and long-running job orchestration through a sandbox gateway
// ABOUTME: Gateway proxy, lifecycle manager and job implementations sharing one envelope contract

pub mod config;
pub mod envelope;
pub mod error;
pub mod jobs;
pub mod lifecycle;
pub mod proxy;
pub mod routes;

pub use config::{GatewayConfig, GatewayConfigBuilder, SharedConfig, REQUEST_TIMEOUT_SECS};
pub use envelope::{
    GatewayReply, ResultEnvelope, SandboxDescriptor, SandboxStatus, LOCAL_ERROR_CODE,
    NOT_FOUND_CODE, SUCCESS_CODE,
};
pub use error::{GatewayError, GatewayResult};
pub use jobs::asr::{AsrFinishParams, AsrStartParams};
pub use jobs::{
    AsrJob, AudioConfig, JobResponse, JobState, JobTarget, NoteFileConfig, RemoteJob,
    TranscriptFileConfig,
};
pub use lifecycle::{CreateSandboxRequest, SandboxManager};
pub use proxy::{GatewayProxy, ProxyRequest, TOKEN_HEADER};
