use serde::{Deserialize, Serialize};

use crate::detection::{Detection, DetectionStatus};
use crate::error::UserFacingError;
use crate::model::Notice;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    Hover,
    Selected,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectedFileView {
    pub name: String,
    pub size_label: String,
    pub media_type: String,
    pub preview_url: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadView {
    pub state: UploadState,
    pub file: Option<SelectedFileView>,
    pub can_capture: bool,
    pub can_cancel: bool,
    pub can_scan: bool,
}

/// One detection, pre-formatted for display.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DetectionRow {
    pub leaf: String,
    pub disease: String,
    pub bbox: String,
}

impl From<&Detection> for DetectionRow {
    fn from(d: &Detection) -> Self {
        Self {
            leaf: d.leaf_line(),
            disease: d.disease_line(),
            bbox: d.bbox_line(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DetectionView {
    pub status: DetectionStatus,
    pub is_loading: bool,
    pub modal_visible: bool,
    pub error: Option<UserFacingError>,
    pub annotated_image_url: Option<String>,
    pub detections: Vec<DetectionRow>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewModel {
    pub upload: UploadView,
    pub detection: DetectionView,
    pub notice: Option<Notice>,
}
