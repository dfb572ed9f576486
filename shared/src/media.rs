use base64::Engine;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::BYTES_PER_MEGABYTE;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MediaError {
    #[error("annotated image payload is empty")]
    Empty,

    #[error("annotated image is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

/// The two image types the upload surface accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    Jpeg,
    Png,
}

impl MediaType {
    /// Parses a declared media type such as `image/jpeg` or
    /// `Image/PNG; charset=binary`.
    pub fn parse(declared: &str) -> Option<Self> {
        let essence = declared.split(';').next().unwrap_or_default().trim();
        if essence.eq_ignore_ascii_case("image/jpeg") {
            Some(Self::Jpeg)
        } else if essence.eq_ignore_ascii_case("image/png") {
            Some(Self::Png)
        } else {
            None
        }
    }

    pub const fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    /// Format of `bytes` judged from their magic number.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match image::guess_format(bytes).ok()? {
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::Png => Some(Self::Png),
            _ => None,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

pub fn format_megabytes(size_bytes: u64) -> String {
    #[allow(clippy::cast_precision_loss)]
    let megabytes = size_bytes as f64 / BYTES_PER_MEGABYTE;
    format!("{megabytes:.2} MB")
}

/// Overlay image returned by the classifier, already decoded.
#[derive(Clone, PartialEq, Eq)]
pub struct AnnotatedImage {
    bytes: Vec<u8>,
    media_type: MediaType,
}

impl AnnotatedImage {
    pub fn from_base64(encoded: &str) -> Result<Self, MediaError> {
        let encoded = encoded.trim();
        if encoded.is_empty() {
            return Err(MediaError::Empty);
        }
        let bytes = base64::engine::general_purpose::STANDARD.decode(encoded)?;
        if bytes.is_empty() {
            return Err(MediaError::Empty);
        }
        // The service sends JPEG; trust the bytes when they say otherwise.
        let media_type = MediaType::sniff(&bytes).unwrap_or(MediaType::Jpeg);
        Ok(Self { bytes, media_type })
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn data_url(&self) -> String {
        let b64 = base64::engine::general_purpose::STANDARD.encode(&self.bytes);
        format!("data:{};base64,{}", self.media_type.mime(), b64)
    }
}

impl fmt::Debug for AnnotatedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnotatedImage")
            .field("media_type", &self.media_type)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}
