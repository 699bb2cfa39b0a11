//! Audio-driven talking-head video (WAN Infinite Talk workflows).

use comfyfront_comfyui::history::{OutputKind, OutputSelector};
use comfyfront_core::injection::{FieldUpdate, NodeSelector};
use comfyfront_core::task::{TaskKind, LIPSYNC_DEFAULT_RESOLUTION};

use super::{MediaInput, TaskPlan};

pub const IMAGE_STAGING_PREFIX: &str = "lipsync_input";
pub const AUDIO_STAGING_PREFIX: &str = "lipsync_audio";

/// Names for in-memory uploads that arrive without one.
pub const DEFAULT_IMAGE_NAME: &str = "portrait.png";
pub const DEFAULT_AUDIO_NAME: &str = "audio.wav";

pub const DEFAULT_STEPS: u32 = 15;
pub const DEFAULT_PROMPT: &str = "woman talking";

/// Seed value callers use to mean "keep the template's seed".
pub const KEEP_TEMPLATE_SEED: i64 = -1;

pub const LOAD_IMAGE: NodeSelector = NodeSelector {
    role: "portrait image",
    class_type: "LoadImage",
    fallback_id: Some("284"),
    required: true,
};

pub const LOAD_AUDIO: NodeSelector = NodeSelector {
    role: "driving audio",
    class_type: "LoadAudio",
    fallback_id: Some("125"),
    required: true,
};

pub const SAMPLER: NodeSelector = NodeSelector {
    role: "sampler",
    class_type: "WanVideoSampler",
    fallback_id: Some("128"),
    required: false,
};

pub const TEXT_ENCODER: NodeSelector = NodeSelector {
    role: "positive prompt",
    class_type: "WanVideoTextEncode",
    fallback_id: Some("241"),
    required: false,
};

/// The video combine node. It reports mp4 output under `gifs`.
pub const VIDEO_OUTPUT_NODE: &str = "131";
pub const RESULT_KEYS: &[&str] = &["gifs", "videos"];

/// Parameters for one lipsync generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LipsyncRequest {
    pub image: MediaInput,
    pub audio: MediaInput,
    /// Output resolution tier; unknown tiers use
    /// [`LIPSYNC_DEFAULT_RESOLUTION`].
    pub resolution: String,
    /// `None` or [`KEEP_TEMPLATE_SEED`] keeps the template's seed.
    pub seed: Option<i64>,
    pub steps: u32,
    pub prompt: String,
}

impl LipsyncRequest {
    pub fn new(image: MediaInput, audio: MediaInput) -> Self {
        Self {
            image,
            audio,
            resolution: LIPSYNC_DEFAULT_RESOLUTION.to_string(),
            seed: None,
            steps: DEFAULT_STEPS,
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }

    pub fn with_resolution(mut self, resolution: impl ToString) -> Self {
        self.resolution = resolution.to_string();
        self
    }

    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_steps(mut self, steps: u32) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Seed to write into the sampler, if any.
    fn effective_seed(&self) -> Option<i64> {
        self.seed.filter(|s| *s != KEEP_TEMPLATE_SEED && *s >= 0)
    }
}

pub fn plan(request: &LipsyncRequest, staged_image: &str, staged_audio: &str) -> TaskPlan {
    let mut updates = vec![
        FieldUpdate::new(LOAD_IMAGE, "image", staged_image),
        FieldUpdate::new(LOAD_AUDIO, "audio", staged_audio),
    ];
    if let Some(seed) = request.effective_seed() {
        updates.push(FieldUpdate::new(SAMPLER, "seed", seed));
    }
    updates.push(FieldUpdate::new(SAMPLER, "steps", request.steps));
    updates.push(FieldUpdate::new(
        TEXT_ENCODER,
        "positive_prompt",
        request.prompt.as_str(),
    ));

    TaskPlan {
        task: TaskKind::LipSync,
        variant: Some(request.resolution.clone()),
        updates,
        output: OutputSelector::node(VIDEO_OUTPUT_NODE, RESULT_KEYS, OutputKind::File),
    }
}
