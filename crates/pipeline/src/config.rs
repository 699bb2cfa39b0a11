use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use comfyfront_comfyui::job::JobTiming;

/// Pipeline configuration loaded from environment variables.
///
/// All fields have defaults matching a local ComfyUI checkout next to
/// the working directory. Override via environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Base HTTP URL of the engine (default: `http://127.0.0.1:8188`).
    pub engine_base_url: String,
    /// Engine input directory that staged files are written to.
    pub input_dir: PathBuf,
    /// Engine output directory that results are read from.
    pub output_dir: PathBuf,
    /// Root of the workflow template tree.
    pub workflows_dir: PathBuf,
    pub default_poll_interval: Duration,
    pub default_max_wait: Duration,
    /// Per-request HTTP timeout for calls to the engine.
    pub request_timeout: Duration,
    /// Node checked first for the transcript. Unset scans every node.
    pub transcription_output_node: Option<String>,
    /// Node checked first for synthesized audio.
    pub speech_output_node: Option<String>,
}

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has an invalid value: {value:?}")]
    Invalid { var: &'static str, value: String },
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            engine_base_url: "http://127.0.0.1:8188".to_string(),
            input_dir: PathBuf::from("ComfyUI/input"),
            output_dir: PathBuf::from("ComfyUI/output"),
            workflows_dir: PathBuf::from("workflows"),
            default_poll_interval: Duration::from_millis(2000),
            default_max_wait: Duration::from_secs(600),
            request_timeout: Duration::from_secs(30),
            transcription_output_node: None,
            speech_output_node: None,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                 |
    /// |-------------------------------|-------------------------|
    /// | `COMFYUI_URL`                 | `http://127.0.0.1:8188` |
    /// | `COMFYUI_INPUT_DIR`           | `ComfyUI/input`         |
    /// | `COMFYUI_OUTPUT_DIR`          | `ComfyUI/output`        |
    /// | `WORKFLOWS_DIR`               | `workflows`             |
    /// | `POLL_INTERVAL_MS`            | `2000`                  |
    /// | `MAX_WAIT_SECS`               | `600`                   |
    /// | `ENGINE_REQUEST_TIMEOUT_SECS` | `30`                    |
    /// | `TRANSCRIPTION_OUTPUT_NODE`   | unset                   |
    /// | `SPEECH_OUTPUT_NODE`          | unset                   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading variables through
    /// `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let text = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let engine_base_url = text("COMFYUI_URL").unwrap_or(defaults.engine_base_url);
        let input_dir = text("COMFYUI_INPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.input_dir);
        let output_dir = text("COMFYUI_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.output_dir);
        let workflows_dir = text("WORKFLOWS_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.workflows_dir);

        let poll_ms: u64 = parse_var("POLL_INTERVAL_MS", text("POLL_INTERVAL_MS"), 2000)?;
        let max_wait_secs: u64 = parse_var("MAX_WAIT_SECS", text("MAX_WAIT_SECS"), 600)?;
        let timeout_secs: u64 = parse_var(
            "ENGINE_REQUEST_TIMEOUT_SECS",
            text("ENGINE_REQUEST_TIMEOUT_SECS"),
            30,
        )?;

        if poll_ms == 0 {
            return Err(ConfigError::Invalid {
                var: "POLL_INTERVAL_MS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            engine_base_url,
            input_dir,
            output_dir,
            workflows_dir,
            default_poll_interval: Duration::from_millis(poll_ms),
            default_max_wait: Duration::from_secs(max_wait_secs),
            request_timeout: Duration::from_secs(timeout_secs),
            transcription_output_node: text("TRANSCRIPTION_OUTPUT_NODE"),
            speech_output_node: text("SPEECH_OUTPUT_NODE"),
        })
    }

    /// Poll cadence used by the task entry points.
    pub fn default_timing(&self) -> JobTiming {
        JobTiming {
            poll_interval: self.default_poll_interval,
            max_wait: self.default_max_wait,
        }
    }
}

fn parse_var<T: FromStr>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}
