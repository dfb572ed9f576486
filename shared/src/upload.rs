//! Acquisition of the single image the user wants classified.
//!
//! [`UploadController`] holds at most one [`SelectedImage`]. Files are
//! validated on the way in; anything that is not a non-empty JPEG or PNG
//! within the size limit is refused without touching the current selection.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::{AppError, ErrorKind};
use crate::event::{CandidateFile, ImageId};
use crate::media::{format_megabytes, MediaType};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("unsupported media type '{0}', expected image/jpeg or image/png")]
    UnsupportedMediaType(String),

    #[error("file '{0}' is empty")]
    EmptyFile(String),

    #[error("file is {size} bytes, max {max}")]
    TooLarge { size: usize, max: usize },

    #[error("file content does not match declared type {declared}")]
    ContentMismatch { declared: MediaType },
}

impl From<UploadError> for AppError {
    fn from(e: UploadError) -> Self {
        let kind = match &e {
            UploadError::UnsupportedMediaType(_) => ErrorKind::UnsupportedMediaType,
            UploadError::EmptyFile(_) => ErrorKind::EmptyFile,
            UploadError::TooLarge { .. } => ErrorKind::FileTooLarge,
            UploadError::ContentMismatch { .. } => ErrorKind::ContentMismatch,
        };
        let err = AppError::new(kind, e.to_string());
        match e {
            UploadError::TooLarge { max, .. } => err.with_context("max_bytes", max.to_string()),
            _ => err,
        }
    }
}

/// Runtime class of the client, decided once at mount.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    Mobile,
    #[default]
    Desktop,
}

impl Platform {
    /// Classifies a reported client identifier (a user agent string).
    pub fn classify(client_identifier: &str) -> Self {
        let android = client_identifier.to_ascii_lowercase().contains("android");
        let ios = ["iPad", "iPhone", "iPod"]
            .iter()
            .any(|device| client_identifier.contains(device));
        if android || ios {
            Self::Mobile
        } else {
            Self::Desktop
        }
    }

    pub fn is_mobile(self) -> bool {
        self == Self::Mobile
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct SelectedImage {
    id: ImageId,
    name: String,
    media_type: MediaType,
    bytes: Vec<u8>,
}

impl SelectedImage {
    pub fn id(&self) -> ImageId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn size_label(&self) -> String {
        format_megabytes(self.size_bytes())
    }
}

impl fmt::Debug for SelectedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedImage")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

/// Object URL the shell created to preview the current image.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Preview {
    image_id: ImageId,
    url: String,
}

/// What changed when a file was accepted or dropped. Any preview URL listed
/// here is no longer referenced and must be released by the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectionChange {
    pub image_id: ImageId,
    pub released_preview: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureDecision {
    OpenCamera,
    Unsupported,
    Ignored,
}

#[derive(Debug, Default)]
pub struct UploadController {
    selected: Option<SelectedImage>,
    preview: Option<Preview>,
    hovering: bool,
    platform: Platform,
}

impl UploadController {
    /// Validates `candidate` and makes it the current selection, replacing
    /// any previous one.
    pub fn select(
        &mut self,
        candidate: CandidateFile,
        max_bytes: usize,
    ) -> Result<SelectionChange, UploadError> {
        let CandidateFile {
            name,
            media_type,
            bytes,
        } = candidate;

        let Some(declared) = MediaType::parse(&media_type) else {
            warn!(media_type = %media_type, "rejected file with unsupported media type");
            return Err(UploadError::UnsupportedMediaType(media_type));
        };

        if bytes.is_empty() {
            warn!("rejected empty file");
            return Err(UploadError::EmptyFile(name));
        }

        if bytes.len() > max_bytes {
            warn!(size = bytes.len(), max = max_bytes, "rejected oversized file");
            return Err(UploadError::TooLarge {
                size: bytes.len(),
                max: max_bytes,
            });
        }

        if MediaType::sniff(&bytes) != Some(declared) {
            warn!(declared = %declared, "rejected file whose content does not match its type");
            return Err(UploadError::ContentMismatch { declared });
        }

        let image = SelectedImage {
            id: ImageId::generate(),
            name,
            media_type: declared,
            bytes,
        };
        info!(image_id = %image.id, size = image.bytes.len(), media_type = %declared, "image selected");

        let image_id = image.id;
        self.selected = Some(image);
        self.hovering = false;

        Ok(SelectionChange {
            image_id,
            released_preview: self.preview.take().map(|p| p.url),
        })
    }

    /// Clears the selection. `None` when nothing was selected.
    pub fn cancel(&mut self) -> Option<SelectionChange> {
        let image = self.selected.take()?;
        self.hovering = false;
        info!(image_id = %image.id, "selection cancelled");
        Some(SelectionChange {
            image_id: image.id,
            released_preview: self.preview.take().map(|p| p.url),
        })
    }

    /// Attaches a freshly created preview URL. If the image it was made for
    /// is no longer selected the URL is handed back for release.
    pub fn attach_preview(&mut self, image_id: ImageId, url: String) -> Option<String> {
        let current = self.selected.as_ref().map(SelectedImage::id);
        if current != Some(image_id) {
            debug!(image_id = %image_id, "preview arrived for a stale image");
            return Some(url);
        }
        self.preview
            .replace(Preview { image_id, url })
            .map(|old| old.url)
    }

    /// Drops the preview without touching the selection, e.g. on unmount.
    pub fn release_preview(&mut self) -> Option<String> {
        self.preview.take().map(|p| p.url)
    }

    pub fn request_capture(&self) -> CaptureDecision {
        match (self.platform, self.selected.is_some()) {
            (Platform::Desktop, _) => CaptureDecision::Unsupported,
            (Platform::Mobile, false) => CaptureDecision::OpenCamera,
            (Platform::Mobile, true) => CaptureDecision::Ignored,
        }
    }

    pub fn set_hovering(&mut self, hovering: bool) {
        self.hovering = hovering;
    }

    pub fn set_platform(&mut self, platform: Platform) {
        self.platform = platform;
    }

    pub fn selected(&self) -> Option<&SelectedImage> {
        self.selected.as_ref()
    }

    pub fn preview_url(&self) -> Option<&str> {
        self.preview
            .as_ref()
            .filter(|p| Some(p.image_id) == self.selected.as_ref().map(SelectedImage::id))
            .map(|p| p.url.as_str())
    }

    pub fn is_hovering(&self) -> bool {
        self.hovering
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::fixtures::{GIF_HEADER, JPEG_HEADER, PNG_HEADER};
    use crate::MAX_IMAGE_BYTES;
    use assert_matches::assert_matches;

    fn jpeg(name: &str) -> CandidateFile {
        CandidateFile::new(name, "image/jpeg", JPEG_HEADER.to_vec())
    }

    #[test]
    fn select_accepts_jpeg_and_png() {
        let mut upload = UploadController::default();
        let change = upload.select(jpeg("leaf.jpg"), MAX_IMAGE_BYTES).unwrap();
        assert_eq!(upload.selected().map(SelectedImage::id), Some(change.image_id));
        assert_eq!(upload.selected().unwrap().media_type(), MediaType::Jpeg);

        let png = CandidateFile::new("leaf.png", "image/png", PNG_HEADER.to_vec());
        upload.select(png, MAX_IMAGE_BYTES).unwrap();
        assert_eq!(upload.selected().unwrap().name(), "leaf.png");
    }

    #[test]
    fn select_rejects_gif_and_keeps_current() {
        let mut upload = UploadController::default();
        upload.select(jpeg("leaf.jpg"), MAX_IMAGE_BYTES).unwrap();

        let gif = CandidateFile::new("leaf.gif", "image/gif", GIF_HEADER.to_vec());
        assert_matches!(
            upload.select(gif, MAX_IMAGE_BYTES),
            Err(UploadError::UnsupportedMediaType(t)) if t == "image/gif"
        );
        assert_eq!(upload.selected().unwrap().name(), "leaf.jpg");
    }

    #[test]
    fn select_rejects_empty_file() {
        let mut upload = UploadController::default();
        let empty = CandidateFile::new("empty.png", "image/png", Vec::new());
        assert_matches!(upload.select(empty, MAX_IMAGE_BYTES), Err(UploadError::EmptyFile(_)));
        assert!(upload.selected().is_none());
    }

    #[test]
    fn select_rejects_oversized_file() {
        let mut upload = UploadController::default();
        assert_matches!(
            upload.select(jpeg("big.jpg"), 4),
            Err(UploadError::TooLarge { size: 12, max: 4 })
        );
    }

    #[test]
    fn select_rejects_mislabelled_content() {
        let mut upload = UploadController::default();
        let fake = CandidateFile::new("fake.png", "image/png", JPEG_HEADER.to_vec());
        assert_matches!(
            upload.select(fake, MAX_IMAGE_BYTES),
            Err(UploadError::ContentMismatch {
                declared: MediaType::Png
            })
        );
    }

    #[test]
    fn new_selection_releases_old_preview() {
        let mut upload = UploadController::default();
        let first = upload.select(jpeg("a.jpg"), MAX_IMAGE_BYTES).unwrap();
        assert_eq!(upload.attach_preview(first.image_id, "blob:a".into()), None);
        assert_eq!(upload.preview_url(), Some("blob:a"));

        let second = upload.select(jpeg("b.jpg"), MAX_IMAGE_BYTES).unwrap();
        assert_eq!(second.released_preview.as_deref(), Some("blob:a"));
        assert_eq!(upload.preview_url(), None);
    }

    #[test]
    fn stale_preview_is_handed_back() {
        let mut upload = UploadController::default();
        let first = upload.select(jpeg("a.jpg"), MAX_IMAGE_BYTES).unwrap();
        upload.select(jpeg("b.jpg"), MAX_IMAGE_BYTES).unwrap();

        assert_eq!(
            upload.attach_preview(first.image_id, "blob:a".into()),
            Some("blob:a".to_string())
        );
        assert_eq!(upload.preview_url(), None);
    }

    #[test]
    fn cancel_clears_selection_and_preview() {
        let mut upload = UploadController::default();
        let change = upload.select(jpeg("a.jpg"), MAX_IMAGE_BYTES).unwrap();
        upload.attach_preview(change.image_id, "blob:a".into());

        let cancelled = upload.cancel().unwrap();
        assert_eq!(cancelled.image_id, change.image_id);
        assert_eq!(cancelled.released_preview.as_deref(), Some("blob:a"));
        assert!(upload.selected().is_none());
    }

    #[test]
    fn cancel_clears_leftover_hover() {
        let mut upload = UploadController::default();
        upload.select(jpeg("a.jpg"), MAX_IMAGE_BYTES).unwrap();
        upload.set_hovering(true);

        upload.cancel().unwrap();
        assert!(!upload.is_hovering());
    }

    #[test]
    fn cancel_without_selection_is_noop() {
        let mut upload = UploadController::default();
        assert_eq!(upload.cancel(), None);
    }

    #[test]
    fn platform_classification() {
        assert_eq!(
            Platform::classify("Mozilla/5.0 (Linux; Android 14; Pixel 8)"),
            Platform::Mobile
        );
        assert_eq!(
            Platform::classify("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)"),
            Platform::Mobile
        );
        assert_eq!(
            Platform::classify("Mozilla/5.0 (X11; Linux x86_64) Firefox/128.0"),
            Platform::Desktop
        );
        // iOS device names are matched case-sensitively.
        assert_eq!(Platform::classify("ipad-like"), Platform::Desktop);
    }

    #[test]
    fn capture_branches_on_platform() {
        let mut upload = UploadController::default();
        assert_eq!(upload.request_capture(), CaptureDecision::Unsupported);

        upload.set_platform(Platform::Mobile);
        assert_eq!(upload.request_capture(), CaptureDecision::OpenCamera);

        upload.select(jpeg("a.jpg"), MAX_IMAGE_BYTES).unwrap();
        assert_eq!(upload.request_capture(), CaptureDecision::Ignored);
    }

    #[test]
    fn selection_clears_hover() {
        let mut upload = UploadController::default();
        upload.set_hovering(true);
        upload.select(jpeg("a.jpg"), MAX_IMAGE_BYTES).unwrap();
        assert!(!upload.is_hovering());
    }
}
