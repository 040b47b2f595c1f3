/// Convenience result type used across the studio.
pub type StudioResult<T> = Result<T, StudioError>;

/// Top-level error taxonomy used by studio APIs.
#[derive(thiserror::Error, Debug)]
pub enum StudioError {
    /// Invalid user-provided settings, project data or arguments.
    #[error("validation error: {0}")]
    Validation(String),

    /// Errors while drawing a frame onto the raster surface.
    #[error("render error: {0}")]
    Render(String),

    /// Errors while decoding, analysing or playing audio.
    #[error("audio error: {0}")]
    Audio(String),

    /// Errors from the capture pipeline (encoder, destination, finalize).
    #[error("capture error: {0}")]
    Capture(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StudioError {
    /// Build a [`StudioError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`StudioError::Render`] value.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`StudioError::Audio`] value.
    pub fn audio(msg: impl Into<String>) -> Self {
        Self::Audio(msg.into())
    }

    /// Build a [`StudioError::Capture`] value.
    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture(msg.into())
    }

    /// Build a [`StudioError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

impl From<serde_json::Error> for StudioError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
