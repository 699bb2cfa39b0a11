//! Entry points used by the request layer.
//!
//! Every task follows the same order: stage inputs, load the template,
//! inject parameters, submit, poll, resolve. Staged inputs are never
//! removed afterwards.

use std::path::PathBuf;

use comfyfront_comfyui::api::ComfyUIApi;
use comfyfront_comfyui::job::{Artifact, JobClient, JobTiming};
use comfyfront_comfyui::resolve::OutputResolver;
use comfyfront_comfyui::staging::InputStager;
use comfyfront_core::injection::inject;
use comfyfront_core::task::TaskKind;
use comfyfront_core::templates::TemplateStore;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::tasks::lipsync::{self, LipsyncRequest};
use crate::tasks::{speech, transcription, MediaInput, TaskPlan};

/// Runs pipeline tasks against one ComfyUI engine.
///
/// Holds no per-job state, so one instance can serve many concurrent
/// callers. The engine decides whether overlapping jobs queue.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: PipelineConfig,
    templates: TemplateStore,
    stager: InputStager,
    jobs: JobClient,
}

impl Orchestrator {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        let api = ComfyUIApi::with_timeout(config.engine_base_url.clone(), config.request_timeout)?;
        let jobs = JobClient::new(api, OutputResolver::new(config.output_dir.clone()));

        Ok(Self {
            templates: TemplateStore::new(config.workflows_dir.clone()),
            stager: InputStager::new(config.input_dir.clone()),
            jobs,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Whether the engine answers `GET /system_stats`.
    pub async fn engine_alive(&self) -> bool {
        match self.jobs.api().system_stats().await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, url = %self.config.engine_base_url, "ComfyUI not reachable");
                false
            }
        }
    }

    /// Transcribe an audio clip and return the recognised text.
    pub async fn transcribe(&self, audio: &MediaInput) -> Result<String, PipelineError> {
        let staged = audio
            .stage(
                &self.stager,
                transcription::STAGING_PREFIX,
                transcription::DEFAULT_UPLOAD_NAME,
            )
            .await?;
        let plan = transcription::plan(
            &staged.name,
            self.config.transcription_output_node.as_deref(),
        );
        let artifact = self.run(plan, self.config.default_timing()).await?;

        match artifact {
            Artifact::Text(text) => {
                tracing::info!(chars = text.len(), "Transcription complete");
                Ok(text)
            }
            Artifact::File(_) => Err(unexpected(TaskKind::Transcription, "text", "file")),
        }
    }

    /// Speak `text` and return the path of the generated audio file.
    ///
    /// `voice_style` is accepted for API compatibility; the current
    /// templates have no input for it, so it is only logged.
    pub async fn synthesize_speech(
        &self,
        text: &str,
        voice_style: &str,
    ) -> Result<PathBuf, PipelineError> {
        tracing::debug!(voice_style, "Voice style is not applied by the current template");

        let plan = speech::plan(text, self.config.speech_output_node.as_deref());
        let artifact = self.run(plan, self.config.default_timing()).await?;

        match artifact {
            Artifact::File(path) => Ok(path),
            Artifact::Text(_) => Err(unexpected(TaskKind::SpeechSynthesis, "file", "text")),
        }
    }

    /// Generate a talking-head video and return its path.
    pub async fn generate_lipsync(&self, request: &LipsyncRequest) -> Result<PathBuf, PipelineError> {
        let image = request
            .image
            .stage(
                &self.stager,
                lipsync::IMAGE_STAGING_PREFIX,
                lipsync::DEFAULT_IMAGE_NAME,
            )
            .await?;
        let audio = request
            .audio
            .stage(
                &self.stager,
                lipsync::AUDIO_STAGING_PREFIX,
                lipsync::DEFAULT_AUDIO_NAME,
            )
            .await?;

        let artifact = self
            .run(
                lipsync::plan(request, &image.name, &audio.name),
                self.config.default_timing(),
            )
            .await?;

        match artifact {
            Artifact::File(path) => Ok(path),
            Artifact::Text(_) => Err(unexpected(TaskKind::LipSync, "file", "text")),
        }
    }

    /// Load, inject, submit and wait for one plan.
    ///
    /// Injection happens before any network call, so a template missing
    /// a required node fails without reaching the engine.
    pub async fn run(&self, plan: TaskPlan, timing: JobTiming) -> Result<Artifact, PipelineError> {
        let template = self
            .templates
            .load(plan.task, plan.variant.as_deref())
            .await?;
        let workflow = inject(&template, &plan.updates)?;

        let client_id = format!("{}-{}", plan.task.client_prefix(), uuid::Uuid::new_v4());
        tracing::info!(
            task = plan.task.as_str(),
            client_id = %client_id,
            nodes = workflow.len(),
            "Submitting job",
        );

        let artifact = self
            .jobs
            .submit_and_wait(&workflow, &client_id, &plan.output, timing)
            .await?;
        Ok(artifact)
    }
}

fn unexpected(task: TaskKind, expected: &'static str, found: &'static str) -> PipelineError {
    PipelineError::UnexpectedArtifact {
        task,
        expected,
        found,
    }
}
