use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::capabilities::{ClassifierResult, EnvironmentError};
use crate::config::ClientConfig;
use crate::upload::Platform;

// --- Typed IDs ---

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub struct $name(Uuid);

        impl $name {
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

typed_id!(ImageId);
typed_id!(RequestId);

/// A file as handed over by the browse, drop or capture surface, before
/// any validation.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub name: String,
    pub media_type: String,
    #[serde(with = "serde_bytes")]
    pub bytes: Vec<u8>,
}

impl CandidateFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }
}

// Image bytes are never worth printing.
impl fmt::Debug for CandidateFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CandidateFile")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    // --- Lifecycle (shell) ---
    Mounted,
    Unmounted,
    Configure(ClientConfig),

    // --- Upload ---
    FileSelected(CandidateFile),
    FileCancelled,
    DragHoverChanged { active: bool },
    CaptureRequested,

    // --- Detection ---
    ScanRequested,
    ModalDismissed,
    NoticeDismissed,

    // --- Capability responses ---
    PlatformDetected {
        platform: Platform,
    },
    PreviewCreated {
        image_id: ImageId,
        result: Result<String, EnvironmentError>,
    },
    ClassificationCompleted {
        request_id: RequestId,
        result: Box<ClassifierResult>,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mounted => "mounted",
            Self::Unmounted => "unmounted",
            Self::Configure(_) => "configure",
            Self::FileSelected(_) => "file_selected",
            Self::FileCancelled => "file_cancelled",
            Self::DragHoverChanged { .. } => "drag_hover_changed",
            Self::CaptureRequested => "capture_requested",
            Self::ScanRequested => "scan_requested",
            Self::ModalDismissed => "modal_dismissed",
            Self::NoticeDismissed => "notice_dismissed",
            Self::PlatformDetected { .. } => "platform_detected",
            Self::PreviewCreated { .. } => "preview_created",
            Self::ClassificationCompleted { .. } => "classification_completed",
        }
    }

    pub fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::FileSelected(_)
                | Self::FileCancelled
                | Self::DragHoverChanged { .. }
                | Self::CaptureRequested
                | Self::ScanRequested
                | Self::ModalDismissed
                | Self::NoticeDismissed
        )
    }
}
