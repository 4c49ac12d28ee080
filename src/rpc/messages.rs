//! Request and response payloads carried inside frames.
//!
//! Requests are tagged by a `command` field:
//!
//! ```json
//! {"command":"transcribe","audio_path":"/tmp/a.wav","model":"base","task":"transcribe"}
//! {"command":"transcribe","audio_data":"UklGR...","model":"base","language":"de","task":"translate"}
//! {"command":"list_models"}
//! ```
//!
//! Responses carry an optional `error`; see [`Reply`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// What the backend should do with the audio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    /// Transcribe in the spoken language.
    #[default]
    Transcribe,
    /// Translate the speech into English.
    Translate,
}

impl Task {
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Transcribe => "transcribe",
            Task::Translate => "translate",
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Task {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transcribe" => Ok(Task::Transcribe),
            "translate" => Ok(Task::Translate),
            other => Err(format!("unknown task {other:?} (expected transcribe or translate)")),
        }
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Where the backend finds the audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AudioSource {
    /// Absolute path on a filesystem shared with the backend.
    Path { audio_path: String },
    /// Base64 (standard alphabet, padded) encoded file contents.
    Data { audio_data: String },
}

/// One request frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Request {
    Transcribe {
        #[serde(flatten)]
        audio: AudioSource,
        model: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
        task: Task,
    },
    ListModels,
}

impl Request {
    /// Build a transcription request.
    ///
    /// An empty `language` means auto-detect and is omitted from the payload.
    pub fn transcribe(
        audio: AudioSource,
        model: impl Into<String>,
        language: Option<&str>,
        task: Task,
    ) -> Self {
        Request::Transcribe {
            audio,
            model: model.into(),
            language: normalize_language(language),
            task,
        }
    }

    /// Value of the `command` tag, for logging.
    pub fn command(&self) -> &'static str {
        match self {
            Request::Transcribe { .. } => "transcribe",
            Request::ListModels => "list_models",
        }
    }
}

/// Surrounding whitespace is trimmed from non-empty values, so `" en "` is
/// sent as `"en"`. `Some("")` and whitespace-only values collapse to `None`.
pub fn normalize_language(language: Option<&str>) -> Option<String> {
    language
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_owned)
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Shared shape of every response: an optional application error.
pub trait Reply {
    /// The backend's error message, if it reported a failure.
    fn error(&self) -> Option<&str>;
}

fn non_empty(error: &Option<String>) -> Option<&str> {
    error.as_deref().filter(|e| !e.is_empty())
}

/// A single time-aligned chunk of transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    /// Start offset in seconds.
    pub start: f64,
    /// End offset in seconds.
    pub end: f64,
}

/// Result of a `transcribe` command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionResponse {
    pub text: String,
    /// Language the backend detected (or was told to use).
    pub language: String,
    pub segments: Vec<Segment>,
    /// Backend-side inference time in seconds.
    pub processing_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Reply for TranscriptionResponse {
    fn error(&self) -> Option<&str> {
        non_empty(&self.error)
    }
}

/// Result of a `list_models` command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsResponse {
    /// Model name → human-readable description.
    pub available_models: BTreeMap<String, String>,
    /// Models currently resident in backend memory.
    pub loaded_models: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Reply for ModelsResponse {
    fn error(&self) -> Option<&str> {
        non_empty(&self.error)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
