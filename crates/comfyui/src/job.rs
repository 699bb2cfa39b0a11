//! Submit a workflow and wait for its result.
//!
//! [`JobClient::submit_and_wait`] drives one prompt through
//! Submitted -> Polling -> Resolving -> Completed, or ends in
//! [`JobError::GenerationTimeout`]:
//!
//! - Submission failures are final. A rejected graph will not become
//!   valid by waiting, and resubmitting risks duplicate jobs.
//! - Each poll is independent. Transport errors, non-2xx responses and
//!   malformed bodies are logged and count as "not ready yet".
//! - A reported output file that is not on disk yet keeps the job in
//!   Polling; the engine updates history before it flushes the file.
//!
//! Jobs are never cancelled on the engine side. A caller that stops
//! waiting leaves the prompt running there.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use comfyfront_core::workflow::Workflow;

use crate::api::ComfyUIApi;
use crate::history::{entry_for, OutputItem, OutputSelector};
use crate::resolve::OutputResolver;

/// Default delay between history polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default upper bound on how long to wait for a result.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(600);

/// Poll cadence and deadline for one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobTiming {
    pub poll_interval: Duration,
    pub max_wait: Duration,
}

impl Default for JobTiming {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }
}

/// The result of a completed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// A file in the engine's output directory, confirmed to exist.
    File(PathBuf),
    /// A text result reported inline in history.
    Text(String),
}

/// Errors that end a job.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The engine rejected the workflow or could not be reached when
    /// submitting.
    #[error("Failed to submit workflow: {0}")]
    SubmissionFailed(String),

    /// No usable result appeared before the deadline.
    #[error("Prompt {prompt_id} produced no result within {}s", .waited.as_secs())]
    GenerationTimeout { prompt_id: String, waited: Duration },
}

/// What a single history poll observed.
#[derive(Debug)]
enum PollOutcome {
    /// Prompt not in history, or no matching output yet.
    Pending,
    /// The poll itself failed; retried on the next tick.
    Transient(String),
    /// History reports the file but it is not on disk yet.
    AwaitingFile(PathBuf),
    Completed(Artifact),
}

/// Submits workflows to one engine and resolves their outputs.
#[derive(Debug, Clone)]
pub struct JobClient {
    api: ComfyUIApi,
    resolver: OutputResolver,
}

impl JobClient {
    pub fn new(api: ComfyUIApi, resolver: OutputResolver) -> Self {
        Self { api, resolver }
    }

    pub fn api(&self) -> &ComfyUIApi {
        &self.api
    }

    pub fn resolver(&self) -> &OutputResolver {
        &self.resolver
    }

    /// Submit `workflow` and block until `selector` yields a result or
    /// `timing.max_wait` elapses.
    pub async fn submit_and_wait(
        &self,
        workflow: &Workflow,
        client_id: &str,
        selector: &OutputSelector,
        timing: JobTiming,
    ) -> Result<Artifact, JobError> {
        let prompt_id = self.submit(workflow, client_id).await?;
        self.wait_for_result(&prompt_id, selector, timing).await
    }

    /// Queue `workflow` and return the engine's prompt ID.
    pub async fn submit(&self, workflow: &Workflow, client_id: &str) -> Result<String, JobError> {
        let body = workflow
            .to_json()
            .map_err(|e| JobError::SubmissionFailed(e.to_string()))?;

        let response = self
            .api
            .submit_workflow(&body, client_id)
            .await
            .map_err(|e| JobError::SubmissionFailed(e.to_string()))?;

        if response.prompt_id.trim().is_empty() {
            return Err(JobError::SubmissionFailed(
                "Engine returned an empty prompt_id".to_string(),
            ));
        }

        tracing::info!(
            prompt_id = %response.prompt_id,
            client_id,
            queue_number = response.number,
            "Workflow submitted to ComfyUI",
        );
        Ok(response.prompt_id)
    }

    /// Poll history for `prompt_id` until a result is ready.
    ///
    /// Sleeps `poll_interval` before every poll, including the first.
    /// Neither the sleep nor a slow history request runs past
    /// `max_wait`; a poll cut off at the deadline counts as transient.
    pub async fn wait_for_result(
        &self,
        prompt_id: &str,
        selector: &OutputSelector,
        timing: JobTiming,
    ) -> Result<Artifact, JobError> {
        let started = Instant::now();
        let mut attempt = 0u32;

        loop {
            let remaining = timing.max_wait.saturating_sub(started.elapsed());
            tokio::time::sleep(timing.poll_interval.min(remaining)).await;
            attempt += 1;

            let remaining = timing.max_wait.saturating_sub(started.elapsed());
            let outcome =
                match tokio::time::timeout(remaining, self.poll_once(prompt_id, selector)).await {
                    Ok(outcome) => outcome,
                    Err(_) => PollOutcome::Transient(
                        "History request still running at the deadline".to_string(),
                    ),
                };

            match outcome {
                PollOutcome::Completed(artifact) => {
                    tracing::info!(
                        prompt_id,
                        attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Job completed",
                    );
                    return Ok(artifact);
                }
                PollOutcome::Pending => {
                    tracing::debug!(prompt_id, attempt, "Job not ready yet");
                }
                PollOutcome::AwaitingFile(path) => {
                    tracing::debug!(
                        prompt_id,
                        attempt,
                        path = %path.display(),
                        "Output reported but not on disk yet",
                    );
                }
                PollOutcome::Transient(error) => {
                    tracing::warn!(prompt_id, attempt, error = %error, "Polling error");
                }
            }

            let waited = started.elapsed();
            if waited >= timing.max_wait {
                tracing::warn!(prompt_id, attempt, "Job timed out");
                return Err(JobError::GenerationTimeout {
                    prompt_id: prompt_id.to_string(),
                    waited,
                });
            }
        }
    }

    // ---- private helpers ----

    async fn poll_once(&self, prompt_id: &str, selector: &OutputSelector) -> PollOutcome {
        let history = match self.api.get_history(prompt_id).await {
            Ok(history) => history,
            Err(e) => return PollOutcome::Transient(e.to_string()),
        };

        let entry = match entry_for(&history, prompt_id) {
            Ok(Some(entry)) => entry,
            Ok(None) => return PollOutcome::Pending,
            Err(e) => return PollOutcome::Transient(format!("Malformed history entry: {e}")),
        };

        match selector.select(&entry) {
            None => PollOutcome::Pending,
            Some(OutputItem::Text(text)) => PollOutcome::Completed(Artifact::Text(text)),
            Some(OutputItem::File(descriptor)) => {
                let Some(candidate) = self.resolver.candidate_path(&descriptor) else {
                    return PollOutcome::Transient(format!(
                        "Output path escapes output directory: {}/{}",
                        descriptor.subfolder, descriptor.filename
                    ));
                };
                match self.resolver.locate(&descriptor).await {
                    Some(path) => PollOutcome::Completed(Artifact::File(path)),
                    None => PollOutcome::AwaitingFile(candidate),
                }
            }
        }
    }
}
