//! Transcoding: the external job API client and the orchestrator that maps
//! job outcomes onto video state.
pub mod job_client;
pub mod orchestrator;

pub use job_client::{
    HttpJobClient, JobApiError, JobState, JobStatus, JobSubmission, TranscodeJobClient,
};
pub use orchestrator::{resolve_manifest_key, PollSummary, TranscodeOrchestrator};
