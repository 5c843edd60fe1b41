//! Configuration management.
use crate::error::{PipelineError, PipelineResult};
use config::Config;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub recording: RecordingSettings,
    #[serde(default)]
    pub writer: WriterSettings,
}

/// Where and how frames are persisted.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RecordingSettings {
    /// Parent directory for recording trees when the host does not inject one.
    pub base_path: String,
    /// Final path component of the recording tree, one legal directory name.
    pub directory_name: String,
    /// Whether image payloads are written alongside the timestamp log.
    pub save_images: bool,
    /// JPEG quality, 1..=100. Out-of-range values are clamped at startup.
    pub image_quality: u8,
}

/// Writer-thread tuning.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WriterSettings {
    /// Sleep between polls when idle or when the head frame is unresolved.
    pub poll_interval_ms: u64,
    /// Best-effort drain budget after the stop signal.
    pub shutdown_grace_ms: u64,
    /// Resolution attempts before an unresolvable frame is dropped.
    pub max_resolve_attempts: u32,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            recording: RecordingSettings::default(),
            writer: WriterSettings::default(),
        }
    }
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            base_path: "recordings".to_string(),
            directory_name: "camera".to_string(),
            save_images: true,
            image_quality: 75,
        }
    }
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
            shutdown_grace_ms: 500,
            max_resolve_attempts: 100,
        }
    }
}

impl Settings {
    pub fn new(config_name: Option<&str>) -> PipelineResult<Self> {
        let config_path = format!("config/{}", config_name.unwrap_or("default"));
        let s = Config::builder()
            .add_source(config::File::with_name(&config_path))
            .build()
            .map_err(PipelineError::Config)?;

        let settings: Settings = s.try_deserialize().map_err(PipelineError::Config)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Semantic checks that parsing alone cannot catch.
    pub fn validate(&self) -> PipelineResult<()> {
        if !is_legal_directory_name(&self.recording.directory_name) {
            return Err(PipelineError::Configuration(format!(
                "invalid recording directory name: '{}'",
                self.recording.directory_name
            )));
        }
        if self.writer.poll_interval_ms == 0 {
            return Err(PipelineError::Configuration(
                "writer.poll_interval_ms must be at least 1".to_string(),
            ));
        }
        if self.writer.max_resolve_attempts == 0 {
            return Err(PipelineError::Configuration(
                "writer.max_resolve_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// True when `name` is usable as a single path component on common filesystems.
pub fn is_legal_directory_name(name: &str) -> bool {
    if name.is_empty() || name == "." || name == ".." {
        return false;
    }
    !name
        .chars()
        .any(|c| matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || c.is_control())
}
