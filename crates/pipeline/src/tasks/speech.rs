//! Text-to-speech through the VoxCPM workflow.

use comfyfront_comfyui::history::{OutputKind, OutputSelector};
use comfyfront_core::injection::{FieldUpdate, NodeSelector};
use comfyfront_core::task::TaskKind;

use super::TaskPlan;

pub const DEFAULT_VOICE_STYLE: &str = "female, clear voice";

/// The generator node carrying the text to speak. Optional: a template
/// without one runs with its built-in text.
pub const GENERATOR_TEXT: NodeSelector = NodeSelector {
    role: "speech text",
    class_type: "VoxCPM_Generator",
    fallback_id: Some("26"),
    required: false,
};

pub const RESULT_KEYS: &[&str] = &["audio"];

pub fn plan(text: &str, output_node: Option<&str>) -> TaskPlan {
    TaskPlan {
        task: TaskKind::SpeechSynthesis,
        variant: None,
        updates: vec![FieldUpdate::new(GENERATOR_TEXT, "text", text)],
        output: OutputSelector::preferring(output_node, RESULT_KEYS, OutputKind::File),
    }
}
