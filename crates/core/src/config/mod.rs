use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{ParameterSnapshot, Result};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub image: ImageConfig,
    /// Host parameter values applied when an engine is created.
    pub parameters: ParameterSnapshot,
}

impl AppConfig {
    pub fn live_defaults() -> Self {
        Self::default()
    }

    /// Reads a JSON configuration file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// How sampled colour is split across the three panned voices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelMode {
    /// Red, green and blue each drive their own amplitude and pan position.
    #[default]
    Split,
    /// The formula-selected amplitude feeds all three pan positions.
    Mono,
}

/// Configuration specific to the audio subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub block_size: usize,
    pub channels: u16,
    /// Upper bound on the area-average window regardless of the host value.
    pub max_area_size: u32,
    /// Ramp length for pan and gain changes.
    pub smoothing_ms: f32,
    pub channel_mode: ChannelMode,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            block_size: 512,
            channels: 2,
            max_area_size: 15,
            smoothing_ms: 20.0,
            channel_mode: ChannelMode::Split,
        }
    }
}

/// Validation limits applied when loading an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub max_file_bytes: u64,
    /// Exclusive upper bound for width and height.
    pub max_dimension: u32,
    /// Inclusive lower bound for width and height.
    pub min_dimension: u32,
    /// Lower-case extensions accepted by the loader.
    pub extensions: Vec<String>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 50 * 1024 * 1024,
            max_dimension: 4096,
            min_dimension: 2,
            extensions: ["jpg", "jpeg", "png", "gif", "bmp"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl ImageConfig {
    pub fn accepts_extension(&self, extension: &str) -> bool {
        let extension = extension.to_ascii_lowercase();
        self.extensions.iter().any(|allowed| *allowed == extension)
    }
}
