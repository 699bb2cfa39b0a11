//! End-to-end task runs through [`Orchestrator`] against a stub engine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use comfyfront_pipeline::tasks::lipsync::LipsyncRequest;
use comfyfront_pipeline::tasks::MediaInput;
use comfyfront_pipeline::{ErrorKind, Orchestrator, PipelineConfig};
use serde_json::{json, Value};
use tempfile::TempDir;

use comfyfront_testing::{unreachable_url, Reply, StubEngine};

/// Temporary engine directories plus a template tree.
struct Dirs {
    input: TempDir,
    output: TempDir,
    workflows: TempDir,
}

impl Dirs {
    fn new() -> Self {
        Self {
            input: tempfile::tempdir().unwrap(),
            output: tempfile::tempdir().unwrap(),
            workflows: tempfile::tempdir().unwrap(),
        }
    }

    fn template(&self, relative: &str, body: Value) {
        let path = self.workflows.path().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, serde_json::to_vec_pretty(&body).unwrap()).unwrap();
    }

    fn output_file(&self, subfolder: &str, name: &str) -> PathBuf {
        let dir = self.output.path().join(subfolder);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, b"media").unwrap();
        path
    }

    fn source(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.workflows.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn staged(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.input.path())
            .map(|rd| {
                rd.map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    fn config(&self, base_url: &str, max_wait: Duration) -> PipelineConfig {
        PipelineConfig {
            engine_base_url: base_url.to_string(),
            input_dir: self.input.path().to_path_buf(),
            output_dir: self.output.path().to_path_buf(),
            workflows_dir: self.workflows.path().to_path_buf(),
            default_poll_interval: Duration::from_millis(10),
            default_max_wait: max_wait,
            request_timeout: Duration::from_secs(5),
            transcription_output_node: None,
            speech_output_node: None,
        }
    }

    fn orchestrator(&self, base_url: &str, max_wait: Duration) -> Orchestrator {
        Orchestrator::new(self.config(base_url, max_wait)).unwrap()
    }
}

fn transcription_template() -> Value {
    json!({
        "13": { "class_type": "LoadAudio", "inputs": { "audio": "placeholder.wav" } },
        "26": { "class_type": "WhisperCaption", "inputs": { "audio": ["13", 0] } }
    })
}

fn lipsync_template() -> Value {
    json!({
        "125": { "class_type": "LoadAudio", "inputs": { "audio": "placeholder.wav" } },
        "128": { "class_type": "WanVideoSampler", "inputs": { "seed": 42, "steps": 4 } },
        "131": { "class_type": "VHS_VideoCombine", "inputs": { "frame_rate": 25, "images": ["128", 0] } },
        "241": { "class_type": "WanVideoTextEncode", "inputs": { "positive_prompt": "a person" } },
        "284": { "class_type": "LoadImage", "inputs": { "image": "placeholder.png" } }
    })
}

fn submitted_prompt(engine: &StubEngine) -> Value {
    let submissions = engine.submissions();
    assert_eq!(submissions.len(), 1);
    submissions[0]["prompt"].clone()
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

// ---------------------------------------------------------------------------
// Transcription
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transcription_returns_text_after_pending_polls() {
    let dirs = Dirs::new();
    dirs.template("audio/audio_caption_api.json", transcription_template());
    let engine = StubEngine::start(vec![
        Reply::empty(),
        Reply::empty(),
        Reply::outputs(json!({ "26": { "text": ["Hello world"] } })),
    ])
    .await;

    let text = dirs
        .orchestrator(&engine.base_url, Duration::from_secs(5))
        .transcribe(&MediaInput::bytes(b"webm".to_vec(), "recording.webm"))
        .await
        .unwrap();

    assert_eq!(text, "Hello world");
    assert_eq!(engine.polls(), 3);

    let staged = dirs.staged();
    assert_eq!(staged.len(), 1);
    assert!(staged[0].starts_with("transcribe_"));
    assert!(staged[0].ends_with("_recording.webm"));

    let prompt = submitted_prompt(&engine);
    assert_eq!(prompt["13"]["inputs"]["audio"], json!(staged[0]));
    assert_eq!(prompt["26"]["inputs"]["audio"], json!(["13", 0]));

    let client_id = engine.submissions()[0]["client_id"].as_str().unwrap().to_string();
    assert!(client_id.starts_with("comfyfront-transcribe-"));
}

#[tokio::test]
async fn unnamed_upload_is_staged_under_default_name() {
    let dirs = Dirs::new();
    dirs.template("audio/audio_caption_api.json", transcription_template());
    let engine =
        StubEngine::start(vec![Reply::outputs(json!({ "26": { "text": ["hi"] } }))]).await;

    dirs.orchestrator(&engine.base_url, Duration::from_secs(5))
        .transcribe(&MediaInput::bytes(b"webm".to_vec(), "  "))
        .await
        .unwrap();

    let staged = dirs.staged();
    assert_eq!(staged.len(), 1);
    assert!(staged[0].starts_with("transcribe_"));
    assert!(staged[0].ends_with("_recording.webm"), "{}", staged[0]);
}

#[tokio::test]
async fn configured_transcription_node_wins_over_earlier_outputs() {
    let dirs = Dirs::new();
    dirs.template("audio/audio_caption_api.json", transcription_template());
    let engine = StubEngine::start(vec![Reply::outputs(json!({
        "40": { "text": ["debug preview"] },
        "26": { "text": ["the transcript"] }
    }))])
    .await;

    let mut config = dirs.config(&engine.base_url, Duration::from_secs(5));
    config.transcription_output_node = Some("26".to_string());
    let text = Orchestrator::new(config)
        .unwrap()
        .transcribe(&MediaInput::bytes(b"webm".to_vec(), "recording.webm"))
        .await
        .unwrap();

    assert_eq!(text, "the transcript");
}

#[tokio::test]
async fn missing_required_node_fails_before_any_network_call() {
    let dirs = Dirs::new();
    dirs.template(
        "audio/audio_caption_api.json",
        json!({ "26": { "class_type": "WhisperCaption", "inputs": {} } }),
    );
    let engine = StubEngine::start(vec![Reply::empty()]).await;

    let err = dirs
        .orchestrator(&engine.base_url, Duration::from_secs(5))
        .transcribe(&MediaInput::bytes(b"webm".to_vec(), "recording.webm"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RequiredNodeMissing);
    assert!(engine.submissions().is_empty());
    assert_eq!(engine.polls(), 0);
}

#[tokio::test]
async fn missing_template_is_template_not_found() {
    let dirs = Dirs::new();
    let url = unreachable_url().await;

    let err = dirs
        .orchestrator(&url, Duration::from_secs(5))
        .transcribe(&MediaInput::bytes(b"webm".to_vec(), "recording.webm"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TemplateNotFound);
}

#[tokio::test]
async fn missing_source_file_is_source_not_found() {
    let dirs = Dirs::new();
    dirs.template("audio/audio_caption_api.json", transcription_template());
    let url = unreachable_url().await;

    let err = dirs
        .orchestrator(&url, Duration::from_secs(5))
        .transcribe(&MediaInput::file("/nowhere/clip.wav"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceNotFound);
    assert!(dirs.staged().is_empty());
}

#[tokio::test]
async fn unreachable_engine_is_submission_failure() {
    let dirs = Dirs::new();
    dirs.template("audio/audio_caption_api.json", transcription_template());
    let url = unreachable_url().await;

    let err = dirs
        .orchestrator(&url, Duration::from_secs(5))
        .transcribe(&MediaInput::bytes(b"webm".to_vec(), "recording.webm"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SubmissionFailed);
    // Staging happens before submission and is not rolled back.
    assert_eq!(dirs.staged().len(), 1);
}

#[tokio::test]
async fn engine_that_never_answers_times_out() {
    let dirs = Dirs::new();
    dirs.template("audio/audio_caption_api.json", transcription_template());
    let engine = StubEngine::start(vec![Reply::empty()]).await;

    let err = dirs
        .orchestrator(&engine.base_url, Duration::from_millis(100))
        .transcribe(&MediaInput::bytes(b"webm".to_vec(), "recording.webm"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::GenerationTimeout);
    assert!(err.is_timeout());
}

#[tokio::test]
async fn file_result_for_transcription_never_completes() {
    let dirs = Dirs::new();
    dirs.template("audio/audio_caption_api.json", transcription_template());
    let engine = StubEngine::start(vec![Reply::outputs(json!({
        "26": { "text": [{ "filename": "caption.txt", "subfolder": "", "type": "output" }] }
    }))])
    .await;
    dirs.output_file("", "caption.txt");

    let err = dirs
        .orchestrator(&engine.base_url, Duration::from_millis(200))
        .transcribe(&MediaInput::bytes(b"webm".to_vec(), "recording.webm"))
        .await
        .unwrap_err();

    // A file where text is expected never matches the text selector.
    assert_eq!(err.kind(), ErrorKind::GenerationTimeout);
}

// ---------------------------------------------------------------------------
// Speech synthesis
// ---------------------------------------------------------------------------

#[tokio::test]
async fn speech_returns_audio_path_and_injects_text() {
    let dirs = Dirs::new();
    dirs.template(
        "audio/voxcpm_tts_api.json",
        json!({
            "26": { "class_type": "VoxCPM_Generator", "inputs": { "text": "template text", "cfg_value": 2.0 } },
            "30": { "class_type": "SaveAudio", "inputs": { "audio": ["26", 0] } }
        }),
    );
    let expected = dirs.output_file("audio", "tts_00001_.flac");
    let engine = StubEngine::start(vec![
        Reply::empty(),
        Reply::outputs(json!({
            "30": { "audio": [{ "filename": "tts_00001_.flac", "subfolder": "audio", "type": "output" }] }
        })),
    ])
    .await;

    let path = dirs
        .orchestrator(&engine.base_url, Duration::from_secs(5))
        .synthesize_speech("Good morning", "male, deep voice")
        .await
        .unwrap();

    assert_eq!(path, expected);
    let prompt = submitted_prompt(&engine);
    assert_eq!(prompt["26"]["inputs"]["text"], json!("Good morning"));
    assert_eq!(prompt["26"]["inputs"]["cfg_value"], json!(2.0));
    assert!(dirs.staged().is_empty());
}

#[tokio::test]
async fn speech_template_without_generator_still_runs() {
    let dirs = Dirs::new();
    dirs.template(
        "audio/voxcpm_tts_api.json",
        json!({ "30": { "class_type": "SaveAudio", "inputs": {} } }),
    );
    dirs.output_file("", "tts.wav");
    let engine = StubEngine::start(vec![Reply::outputs(json!({
        "30": { "audio": [{ "filename": "tts.wav", "subfolder": "", "type": "output" }] }
    }))])
    .await;

    let path = dirs
        .orchestrator(&engine.base_url, Duration::from_secs(5))
        .synthesize_speech("unused", "female, clear voice")
        .await
        .unwrap();

    assert_eq!(file_name(&path), "tts.wav");
}

// ---------------------------------------------------------------------------
// Lipsync
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lipsync_stages_inputs_injects_parameters_and_returns_video() {
    let dirs = Dirs::new();
    dirs.template("lipsync/WAN-INFINITE-TALK-512.json", lipsync_template());
    let expected = dirs.output_file("talk", "WanVideo_00001.mp4");
    let image = dirs.source("face.png", b"png");
    let audio = dirs.source("voice.wav", b"wav");
    let engine = StubEngine::start(vec![
        Reply::empty(),
        Reply::outputs(json!({
            "131": { "gifs": [{ "filename": "WanVideo_00001.mp4", "subfolder": "talk", "type": "output" }] }
        })),
    ])
    .await;

    let request = LipsyncRequest::new(MediaInput::file(&image), MediaInput::file(&audio))
        .with_seed(777)
        .with_steps(20)
        .with_prompt("man talking");
    let path = dirs
        .orchestrator(&engine.base_url, Duration::from_secs(5))
        .generate_lipsync(&request)
        .await
        .unwrap();

    assert_eq!(path, expected);

    let staged = dirs.staged();
    assert_eq!(staged.len(), 2);
    let staged_image = staged.iter().find(|n| n.starts_with("lipsync_input_")).unwrap();
    let staged_audio = staged.iter().find(|n| n.starts_with("lipsync_audio_")).unwrap();
    assert!(staged_image.ends_with("_face.png"));
    assert!(staged_audio.ends_with("_voice.wav"));

    let prompt = submitted_prompt(&engine);
    assert_eq!(prompt["284"]["inputs"]["image"], json!(staged_image));
    assert_eq!(prompt["125"]["inputs"]["audio"], json!(staged_audio));
    assert_eq!(prompt["128"]["inputs"]["seed"], json!(777));
    assert_eq!(prompt["128"]["inputs"]["steps"], json!(20));
    assert_eq!(prompt["241"]["inputs"]["positive_prompt"], json!("man talking"));
    assert_eq!(prompt["131"]["inputs"]["images"], json!(["128", 0]));

    // Caller files are untouched.
    assert_eq!(std::fs::read(&image).unwrap(), b"png");
}

#[tokio::test]
async fn lipsync_keeps_template_seed_and_falls_back_to_default_resolution() {
    let dirs = Dirs::new();
    dirs.template("lipsync/WAN-INFINITE-TALK-512.json", lipsync_template());
    dirs.output_file("", "out.mp4");
    let image = dirs.source("face.png", b"png");
    let engine = StubEngine::start(vec![Reply::outputs(json!({
        "131": { "videos": [{ "filename": "out.mp4", "subfolder": "", "type": "output" }] }
    }))])
    .await;

    let request = LipsyncRequest::new(
        MediaInput::file(&image),
        MediaInput::bytes(b"wav".to_vec(), "speech.wav"),
    )
    .with_resolution("1080")
    .with_seed(-1);
    dirs.orchestrator(&engine.base_url, Duration::from_secs(5))
        .generate_lipsync(&request)
        .await
        .unwrap();

    let prompt = submitted_prompt(&engine);
    assert_eq!(prompt["128"]["inputs"]["seed"], json!(42));
    assert_eq!(prompt["128"]["inputs"]["steps"], json!(15));
    assert_eq!(prompt["241"]["inputs"]["positive_prompt"], json!("woman talking"));
}

#[tokio::test]
async fn lipsync_missing_portrait_is_source_not_found() {
    let dirs = Dirs::new();
    dirs.template("lipsync/WAN-INFINITE-TALK-512.json", lipsync_template());
    let audio = dirs.source("voice.wav", b"wav");
    let engine = StubEngine::start(vec![Reply::empty()]).await;

    let request = LipsyncRequest::new(MediaInput::file("/nowhere/face.png"), MediaInput::file(&audio));
    let err = dirs
        .orchestrator(&engine.base_url, Duration::from_secs(5))
        .generate_lipsync(&request)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceNotFound);
    assert!(engine.submissions().is_empty());
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn engine_alive_reflects_reachability() {
    let dirs = Dirs::new();
    let engine = StubEngine::start(vec![]).await;
    assert!(dirs.orchestrator(&engine.base_url, Duration::from_secs(1)).engine_alive().await);

    let url = unreachable_url().await;
    assert!(!dirs.orchestrator(&url, Duration::from_secs(1)).engine_alive().await);
}
