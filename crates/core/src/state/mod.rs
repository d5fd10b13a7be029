//! Versioned session persistence.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{ConversionFormula, ParameterSnapshot, Position, Result, ScanPattern, ScanlineError};

/// Schema version written by [`SessionState::to_bytes`].
pub const STATE_VERSION: u32 = 1;

/// Everything needed to resume a session: image, scan progress and parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionState {
    pub version: u32,
    pub image_path: Option<PathBuf>,
    pub scan_position: Position,
    pub scan_pattern: ScanPattern,
    pub conversion_formula: ConversionFormula,
    /// Reload `image_path` when the state is restored.
    pub auto_load: bool,
    pub parameters: ParameterSnapshot,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            image_path: None,
            scan_position: Position::ORIGIN,
            scan_pattern: ScanPattern::Horizontal,
            conversion_formula: ConversionFormula::RgbAverage,
            auto_load: true,
            parameters: ParameterSnapshot::default(),
        }
    }
}

impl SessionState {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Parses a blob, rejecting versions newer than [`STATE_VERSION`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let state: SessionState = serde_json::from_slice(bytes)?;
        if state.version > STATE_VERSION {
            return Err(ScanlineError::StateVersion {
                found: state.version,
                supported: STATE_VERSION,
            });
        }
        Ok(state)
    }
}
