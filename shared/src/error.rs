use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::media::format_megabytes;
use crate::{DETECTION_FAILED_MESSAGE, MAX_IMAGE_BYTES};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    UnsupportedMediaType,
    EmptyFile,
    FileTooLarge,
    ContentMismatch,
    Network,
    Timeout,
    HttpStatus,
    MalformedResponse,
    InvalidConfig,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::UnsupportedMediaType => "UNSUPPORTED_MEDIA_TYPE",
            Self::EmptyFile => "EMPTY_FILE",
            Self::FileTooLarge => "FILE_TOO_LARGE",
            Self::ContentMismatch => "CONTENT_MISMATCH",
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::HttpStatus => "HTTP_STATUS",
            Self::MalformedResponse => "MALFORMED_RESPONSE",
            Self::InvalidConfig => "INVALID_CONFIG",
        }
    }

    /// Failures of the classification round-trip. They share one user-facing
    /// message and differ only in diagnostics.
    #[must_use]
    pub const fn is_detection_failure(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::HttpStatus | Self::MalformedResponse
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    pub internal_message: Option<String>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            internal_message: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::UnsupportedMediaType => {
                "This file type is not supported. Please use a JPEG or PNG image.".into()
            }
            ErrorKind::EmptyFile => "The selected file is empty. Please choose another photo.".into(),
            ErrorKind::FileTooLarge => {
                let limit = self
                    .context
                    .get("max_bytes")
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or(MAX_IMAGE_BYTES);
                format!(
                    "The image is too large. Please use an image smaller than {}.",
                    format_megabytes(u64::try_from(limit).unwrap_or(u64::MAX))
                )
            }
            ErrorKind::ContentMismatch => {
                "The file does not look like a JPEG or PNG image. Please choose another photo."
                    .into()
            }
            ErrorKind::Network
            | ErrorKind::Timeout
            | ErrorKind::HttpStatus
            | ErrorKind::MalformedResponse => DETECTION_FAILED_MESSAGE.into(),
            ErrorKind::InvalidConfig => self.message.clone(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

/// What the rendering surface is allowed to see of an [`AppError`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserFacingError {
    pub message: String,
    pub error_code: String,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.user_facing_message(),
            error_code: e.code().to_string(),
        }
    }
}
