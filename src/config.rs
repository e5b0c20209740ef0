//! Configuration types for media-queue

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::error::{Error, Result};

/// Processing parameters snapshotted into every task at submission
///
/// Field names match the keys of the desktop application's settings file, so a
/// settings document can be deserialized directly. Every key is optional; a
/// missing key takes the value from [`ProcessingConfig::default`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Output directory for downloaded and produced media (default: "videos")
    pub video_folder: PathBuf,
    /// Number of items to fetch from a playlist/channel URL (default: 5)
    pub video_count: u32,
    /// Download resolution (default: "1080p")
    pub resolution: String,
    /// Voice separation model (default: "htdemucs_ft")
    pub model: String,
    /// Compute device (default: "auto")
    pub device: String,
    /// Number of random shifts for separation (default: 5)
    pub shifts: u32,
    /// Speech recognition model (default: "WhisperX")
    pub asr_model: String,
    /// Speech recognition model size (default: "large")
    pub whisperx_size: String,
    /// Recognition batch size (default: 32)
    pub batch_size: u32,
    /// Run speaker diarization (default: true)
    pub separate_speakers: bool,
    /// Lower bound on detected speakers
    pub min_speakers: Option<u32>,
    /// Upper bound on detected speakers
    pub max_speakers: Option<u32>,
    /// Translation method (default: "LLM")
    pub translation_method: String,
    /// Translation target language (default: "简体中文")
    pub target_language_translation: String,
    /// Speech synthesis method (default: "EdgeTTS")
    pub tts_method: String,
    /// Speech synthesis target language (default: "中文")
    pub target_language_tts: String,
    /// Synthesis voice id (default: "zh-CN-XiaoxiaoNeural")
    pub edge_tts_voice: String,
    /// Burn subtitles into the output (default: true)
    pub add_subtitles: bool,
    /// Playback speed factor (default: 1.0)
    pub speed_factor: f64,
    /// Output frame rate (default: 30)
    pub frame_rate: u32,
    /// Background music file mixed into the output
    pub background_music: Option<PathBuf>,
    /// Background music volume, 0 to 1 (default: 0.5)
    pub bg_music_volume: f64,
    /// Source video volume, 0 to 1 (default: 1.0)
    pub video_volume: f64,
    /// Output resolution (default: "1080p")
    pub output_resolution: String,
    /// Maximum engine worker count (default: 1)
    pub max_workers: u32,
    /// Maximum retries per engine step (default: 3)
    pub max_retries: u32,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            video_folder: PathBuf::from("videos"),
            video_count: 5,
            resolution: "1080p".into(),
            model: "htdemucs_ft".into(),
            device: "auto".into(),
            shifts: 5,
            asr_model: "WhisperX".into(),
            whisperx_size: "large".into(),
            batch_size: 32,
            separate_speakers: true,
            min_speakers: None,
            max_speakers: None,
            translation_method: "LLM".into(),
            target_language_translation: "简体中文".into(),
            tts_method: "EdgeTTS".into(),
            target_language_tts: "中文".into(),
            edge_tts_voice: "zh-CN-XiaoxiaoNeural".into(),
            add_subtitles: true,
            speed_factor: 1.0,
            frame_rate: 30,
            background_music: None,
            bg_music_volume: 0.5,
            video_volume: 1.0,
            output_resolution: "1080p".into(),
            max_workers: 1,
            max_retries: 3,
        }
    }
}

impl ProcessingConfig {
    /// Check value ranges before the snapshot is persisted
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.bg_music_volume) {
            return Err(invalid(
                "bg_music_volume",
                format!("must be within 0..=1, got {}", self.bg_music_volume),
            ));
        }
        if !(0.0..=1.0).contains(&self.video_volume) {
            return Err(invalid(
                "video_volume",
                format!("must be within 0..=1, got {}", self.video_volume),
            ));
        }
        if !(self.speed_factor > 0.0 && self.speed_factor.is_finite()) {
            return Err(invalid(
                "speed_factor",
                format!("must be positive, got {}", self.speed_factor),
            ));
        }
        if self.frame_rate == 0 {
            return Err(invalid("frame_rate", "must be positive".to_string()));
        }
        if let (Some(min), Some(max)) = (self.min_speakers, self.max_speakers)
            && min > max
        {
            return Err(invalid(
                "min_speakers",
                format!("min_speakers ({}) exceeds max_speakers ({})", min, max),
            ));
        }
        Ok(())
    }

    /// Serialize into the immutable snapshot stored with a task
    pub fn to_snapshot(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Human-readable configuration summary
    pub fn summary(&self) -> String {
        format!(
            "● Output directory: {}\n\
             ● Resolution: {}\n\
             ● Voice separation: {}, device: {}\n\
             ● Speech recognition: {}, model: {}\n\
             ● Translation: {}\n\
             ● Speech synthesis: {}, language: {}\n\
             ● Subtitles: {}, speed factor: {:.2}\n",
            self.video_folder.display(),
            self.resolution,
            self.model,
            self.device,
            self.asr_model,
            self.whisperx_size,
            self.translation_method,
            self.tts_method,
            self.target_language_tts,
            if self.add_subtitles { "yes" } else { "no" },
            self.speed_factor,
        )
    }
}

fn invalid(key: &str, detail: String) -> Error {
    Error::Validation(format!("{}: {}", key, detail))
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database path (default: "./tasks.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Worker and event channel behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Grace delay before startup recovery drains the queue (default: 1 second)
    #[serde(default = "default_startup_delay", with = "duration_serde")]
    pub startup_delay: Duration,

    /// Events buffered per subscriber before it starts lagging (default: 1000)
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// How long shutdown waits for the running task (default: 30 seconds)
    #[serde(default = "default_shutdown_timeout", with = "duration_serde")]
    pub shutdown_timeout: Duration,

    /// Mark tasks left Running by a previous process as Failed on startup (default: true)
    #[serde(default = "default_true")]
    pub fail_stale_running: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            startup_delay: default_startup_delay(),
            event_capacity: default_event_capacity(),
            shutdown_timeout: default_shutdown_timeout(),
            fail_stale_running: true,
        }
    }
}

/// Main configuration for the [`Orchestrator`](crate::Orchestrator)
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data storage
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Worker and event channel behavior
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Processing parameters snapshotted into tasks submitted without an explicit config
    #[serde(default)]
    pub processing: ProcessingConfig,
}

impl Config {
    /// Validate the whole configuration
    pub fn validate(&self) -> Result<()> {
        if self.orchestrator.event_capacity == 0 {
            return Err(Error::Config {
                message: "event_capacity must be at least 1".to_string(),
                key: Some("event_capacity".to_string()),
            });
        }
        self.processing.validate().map_err(|e| Error::Config {
            message: e.to_string(),
            key: Some("processing".to_string()),
        })
    }
}

fn default_true() -> bool {
    true
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./tasks.db")
}

fn default_startup_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_event_capacity() -> usize {
    1000
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
