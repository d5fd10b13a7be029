use std::path::PathBuf;

/// Result alias that carries the custom [`ScanlineError`] type.
pub type Result<T> = std::result::Result<T, ScanlineError>;

/// Common error type for the core crate.
///
/// Only image loading, configuration and persistence surface errors. The
/// real-time path converts every fault into silence instead.
#[derive(Debug, thiserror::Error)]
pub enum ScanlineError {
    /// The requested image file does not exist.
    #[error("image file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    /// The image file exceeds the configured size ceiling.
    #[error("image file is too large: {size} bytes (limit is {limit} bytes)")]
    FileTooLarge { size: u64, limit: u64 },
    /// The file extension is not on the allow-list.
    #[error("unsupported image format `{extension}` (expected one of: {allowed})")]
    UnsupportedFormat { extension: String, allowed: String },
    /// The codec could not decode the file.
    #[error("failed to decode image: {0}")]
    Decode(String),
    /// The decoded image is empty, too small or too large.
    #[error("invalid image dimensions {width}x{height}: {reason}")]
    InvalidDimensions {
        width: u32,
        height: u32,
        reason: String,
    },
    /// A host tried to set a parameter id that does not exist.
    #[error("unknown parameter `{0}`")]
    UnknownParameter(String),
    /// A persisted state blob was written by a newer schema.
    #[error("unsupported state version {found} (newest supported is {supported})")]
    StateVersion { found: u32, supported: u32 },
    /// Free-form message for host-side failures (devices, exports).
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around JSON (de)serialisation errors.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl ScanlineError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Returns true for the recoverable failures produced by an image load.
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            Self::FileNotFound(_)
                | Self::FileTooLarge { .. }
                | Self::UnsupportedFormat { .. }
                | Self::Decode(_)
                | Self::InvalidDimensions { .. }
        )
    }
}

impl From<&str> for ScanlineError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for ScanlineError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_errors_render_specific_messages() {
        let err = ScanlineError::FileTooLarge {
            size: 60,
            limit: 50,
        };
        assert!(err.is_load_error());
        assert!(err.to_string().contains("60 bytes"));

        let err = ScanlineError::UnsupportedFormat {
            extension: "txt".to_string(),
            allowed: "png".to_string(),
        };
        assert!(err.to_string().contains("`txt`"));
    }

    #[test]
    fn messages_are_not_load_errors() {
        let err: ScanlineError = "device missing".into();
        assert!(!err.is_load_error());
        assert_eq!(err.to_string(), "device missing");
    }
}
