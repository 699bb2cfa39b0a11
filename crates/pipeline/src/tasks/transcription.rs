//! Speech-to-text through a Whisper-style audio caption workflow.

use comfyfront_comfyui::history::{OutputKind, OutputSelector};
use comfyfront_core::injection::{FieldUpdate, NodeSelector};
use comfyfront_core::task::TaskKind;

use super::TaskPlan;

/// Staged audio is named `transcribe_<epoch>_<file>`.
pub const STAGING_PREFIX: &str = "transcribe";

/// Name given to uploads that arrive without one.
pub const DEFAULT_UPLOAD_NAME: &str = "recording.webm";

pub const LOAD_AUDIO: NodeSelector = NodeSelector {
    role: "audio input",
    class_type: "LoadAudio",
    fallback_id: Some("13"),
    required: true,
};

/// Text may be reported under either key depending on the node pack.
pub const RESULT_KEYS: &[&str] = &["text", "caption"];

/// `output_node` is checked before the remaining output nodes.
pub fn plan(staged_audio: &str, output_node: Option<&str>) -> TaskPlan {
    TaskPlan {
        task: TaskKind::Transcription,
        variant: None,
        updates: vec![FieldUpdate::new(LOAD_AUDIO, "audio", staged_audio)],
        output: OutputSelector::preferring(output_node, RESULT_KEYS, OutputKind::Text),
    }
}
