//! Processing engine boundary
//!
//! The media pipeline (download, voice separation, transcription, translation,
//! speech synthesis, muxing) is an external collaborator. The orchestrator only
//! knows the synchronous contract defined here: an [`EngineRequest`] carrying
//! the parameters in their fixed order, a progress callback, and an
//! [`EngineOutput`] whose empty `output_path` signals failure.
//!
//! # Examples
//!
//! ```
//! use media_queue::engine::{EngineOutput, EngineRequest, ProcessingEngine};
//! use media_queue::EngineFault;
//!
//! struct Echo;
//!
//! impl ProcessingEngine for Echo {
//!     fn process(
//!         &self,
//!         request: &EngineRequest,
//!         progress: &mut dyn FnMut(u8, &str),
//!     ) -> Result<EngineOutput, EngineFault> {
//!         progress(100, "done");
//!         Ok(EngineOutput::new(
//!             "ok",
//!             request.output_dir.join("out.mp4").display().to_string(),
//!         ))
//!     }
//! }
//! ```

use std::path::PathBuf;

use crate::config::ProcessingConfig;
use crate::error::EngineFault;

/// Parameters handed to the processing engine, in contract order
#[derive(Clone, Debug, PartialEq)]
pub struct EngineRequest {
    /// Output directory
    pub output_dir: PathBuf,
    /// Source URL
    pub url: String,
    /// Item count
    pub video_count: u32,
    /// Resolution
    pub resolution: String,
    /// Separation model name
    pub separation_model: String,
    /// Compute device
    pub device: String,
    /// Shift count
    pub shifts: u32,
    /// Speech-recognition model
    pub asr_model: String,
    /// Speech-recognition model size
    pub asr_model_size: String,
    /// Batch size
    pub batch_size: u32,
    /// Speaker-separation flag
    pub separate_speakers: bool,
    /// Min speakers
    pub min_speakers: Option<u32>,
    /// Max speakers
    pub max_speakers: Option<u32>,
    /// Translation method
    pub translation_method: String,
    /// Target translation language
    pub translation_language: String,
    /// Speech-synthesis method
    pub tts_method: String,
    /// Target synthesis language
    pub tts_language: String,
    /// Synthesis voice id
    pub tts_voice: String,
    /// Add-subtitles flag
    pub add_subtitles: bool,
    /// Speed factor
    pub speed_factor: f64,
    /// Frame rate
    pub frame_rate: u32,
    /// Background-music path
    pub background_music: Option<PathBuf>,
    /// Background-music volume (0 to 1)
    pub bg_music_volume: f64,
    /// Source-video volume (0 to 1)
    pub video_volume: f64,
    /// Output resolution
    pub output_resolution: String,
    /// Max worker count
    pub max_workers: u32,
    /// Max retry count
    pub max_retries: u32,
}

impl EngineRequest {
    /// Build the request for `url` from a task's configuration snapshot
    pub fn from_snapshot(url: impl Into<String>, config: &ProcessingConfig) -> Self {
        Self {
            output_dir: config.video_folder.clone(),
            url: url.into(),
            video_count: config.video_count,
            resolution: config.resolution.clone(),
            separation_model: config.model.clone(),
            device: config.device.clone(),
            shifts: config.shifts,
            asr_model: config.asr_model.clone(),
            asr_model_size: config.whisperx_size.clone(),
            batch_size: config.batch_size,
            separate_speakers: config.separate_speakers,
            min_speakers: config.min_speakers,
            max_speakers: config.max_speakers,
            translation_method: config.translation_method.clone(),
            translation_language: config.target_language_translation.clone(),
            tts_method: config.tts_method.clone(),
            tts_language: config.target_language_tts.clone(),
            tts_voice: config.edge_tts_voice.clone(),
            add_subtitles: config.add_subtitles,
            speed_factor: config.speed_factor,
            frame_rate: config.frame_rate,
            background_music: config.background_music.clone(),
            bg_music_volume: config.bg_music_volume,
            video_volume: config.video_volume,
            output_resolution: config.output_resolution.clone(),
            max_workers: config.max_workers,
            max_retries: config.max_retries,
        }
    }

    /// Parameter block logged before the engine is invoked
    pub fn describe(&self) -> Vec<String> {
        vec![
            format!("output directory: {}", self.output_dir.display()),
            format!("url: {}", self.url),
            format!("item count: {}", self.video_count),
            format!("resolution: {}", self.resolution),
            format!("separation model: {}", self.separation_model),
            format!("device: {}", self.device),
            format!("shifts: {}", self.shifts),
            format!("asr model: {} ({})", self.asr_model, self.asr_model_size),
            format!("translation: {}", self.translation_method),
            format!("tts: {}", self.tts_method),
        ]
    }
}

/// What the engine returned
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineOutput {
    /// Human-readable outcome summary
    pub summary: String,
    /// Produced artifact; empty means the run failed
    pub output_path: String,
}

impl EngineOutput {
    /// Create an output
    pub fn new(summary: impl Into<String>, output_path: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            output_path: output_path.into(),
        }
    }

    /// Whether an artifact was produced
    pub fn is_success(&self) -> bool {
        !self.output_path.is_empty()
    }
}

/// The external media pipeline
///
/// `process` is synchronous and may block for a long time; the orchestrator
/// always calls it from a dedicated blocking thread. The call cannot be
/// interrupted once started.
pub trait ProcessingEngine: Send + Sync {
    /// Run the pipeline for one task
    ///
    /// `progress` may be called any number of times with a percentage (0 to 100)
    /// and a status line. Returning `Err` or panicking fails the task.
    fn process(
        &self,
        request: &EngineRequest,
        progress: &mut dyn FnMut(u8, &str),
    ) -> Result<EngineOutput, EngineFault>;

    /// Human-readable name for logging
    fn name(&self) -> &str {
        "engine"
    }
}

impl<F> ProcessingEngine for F
where
    F: Fn(&EngineRequest, &mut dyn FnMut(u8, &str)) -> Result<EngineOutput, EngineFault>
        + Send
        + Sync,
{
    fn process(
        &self,
        request: &EngineRequest,
        progress: &mut dyn FnMut(u8, &str),
    ) -> Result<EngineOutput, EngineFault> {
        self(request, progress)
    }
}

/// Engine used when the media pipeline is unavailable
///
/// Returns immediately without an artifact, so every task it runs ends Failed
/// with the result "processing disabled". Lets a front end run without the
/// pipeline installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledEngine;

impl ProcessingEngine for DisabledEngine {
    fn process(
        &self,
        request: &EngineRequest,
        progress: &mut dyn FnMut(u8, &str),
    ) -> Result<EngineOutput, EngineFault> {
        tracing::debug!(url = %request.url, "Processing disabled, skipping engine call");
        progress(50, "processing disabled");
        Ok(EngineOutput::new("processing disabled", ""))
    }

    fn name(&self) -> &str {
        "disabled"
    }
}
