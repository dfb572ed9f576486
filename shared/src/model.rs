use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;
use crate::detection::DetectionController;
use crate::error::AppError;
use crate::upload::UploadController;

/// A transient message for the user that is not a detection result:
/// rejected files, unsupported capture, bad configuration.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub error_code: Option<String>,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_code: None,
        }
    }
}

impl From<&AppError> for Notice {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.user_facing_message(),
            error_code: Some(e.code().to_string()),
        }
    }
}

/// Page-scoped state. Nothing here outlives the component instance.
#[derive(Debug, Default)]
pub struct Model {
    pub config: ClientConfig,
    pub upload: UploadController,
    pub detection: DetectionController,
    pub notice: Option<Notice>,
}
