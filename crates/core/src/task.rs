//! Task kinds served by the pipeline and their template variants.

use std::fmt;
use std::path::PathBuf;

/// Variant name used by tasks that ship a single template.
pub const DEFAULT_VARIANT: &str = "default";

/// Lipsync resolution tiers with a dedicated template file.
pub const LIPSYNC_RESOLUTIONS: &[&str] = &["256", "512", "768"];

/// Resolution tier used when the requested one has no template.
pub const LIPSYNC_DEFAULT_RESOLUTION: &str = "512";

/// The three kinds of job the pipeline submits to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Speech-to-text over an uploaded audio clip.
    Transcription,
    /// Text-to-speech producing an audio file.
    SpeechSynthesis,
    /// Audio-driven talking-head video from a still image.
    LipSync,
}

impl TaskKind {
    pub const ALL: [TaskKind; 3] = [
        TaskKind::Transcription,
        TaskKind::SpeechSynthesis,
        TaskKind::LipSync,
    ];

    /// Stable lowercase name, used in logs and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Transcription => "transcription",
            TaskKind::SpeechSynthesis => "speech",
            TaskKind::LipSync => "lipsync",
        }
    }

    /// Prefix for the `client_id` sent with each submission.
    pub fn client_prefix(self) -> &'static str {
        match self {
            TaskKind::Transcription => "comfyfront-transcribe",
            TaskKind::SpeechSynthesis => "comfyfront-tts",
            TaskKind::LipSync => "comfyfront-lipsync",
        }
    }

    /// Template variants that have a backing file.
    pub fn variants(self) -> &'static [&'static str] {
        match self {
            TaskKind::Transcription | TaskKind::SpeechSynthesis => &[DEFAULT_VARIANT],
            TaskKind::LipSync => LIPSYNC_RESOLUTIONS,
        }
    }

    pub fn default_variant(self) -> &'static str {
        match self {
            TaskKind::Transcription | TaskKind::SpeechSynthesis => DEFAULT_VARIANT,
            TaskKind::LipSync => LIPSYNC_DEFAULT_RESOLUTION,
        }
    }

    /// Map a requested variant onto a known one.
    ///
    /// Unknown or missing variants fall back to [`default_variant`](Self::default_variant).
    /// This is a permissive policy, not an error.
    pub fn resolve_variant(self, requested: Option<&str>) -> &'static str {
        let Some(requested) = requested else {
            return self.default_variant();
        };
        match self.variants().iter().copied().find(|v| *v == requested.trim()) {
            Some(known) => known,
            None => {
                tracing::warn!(
                    task = self.as_str(),
                    requested,
                    fallback = self.default_variant(),
                    "Unknown template variant, using default",
                );
                self.default_variant()
            }
        }
    }

    /// Path of the template file for a variant, relative to the
    /// template root.
    pub fn template_file(self, variant: &str) -> PathBuf {
        match self {
            TaskKind::Transcription => PathBuf::from("audio").join("audio_caption_api.json"),
            TaskKind::SpeechSynthesis => PathBuf::from("audio").join("voxcpm_tts_api.json"),
            TaskKind::LipSync => {
                PathBuf::from("lipsync").join(format!("WAN-INFINITE-TALK-{variant}.json"))
            }
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
