use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::event::ImageId;
use crate::upload::{Platform, SelectedImage};

/// The host environment: client identification, the file input control,
/// preview object URLs and the device camera picker.
pub struct Environment<E> {
    context: CapabilityContext<EnvironmentOperation, E>,
}

impl<Ev> Capability<Ev> for Environment<Ev> {
    type Operation = EnvironmentOperation;
    type MappedSelf<MappedEv> = Environment<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Environment::new(self.context.map_event(f))
    }
}

impl<E> Environment<E>
where
    E: 'static,
{
    pub fn new(context: CapabilityContext<EnvironmentOperation, E>) -> Self {
        Self { context }
    }

    /// Classifies the client from its reported identifier. A shell that cannot
    /// answer is treated as desktop.
    pub fn is_mobile_client<F>(&self, make_event: F)
    where
        F: FnOnce(Platform) -> E + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let platform = match context
                .request_from_shell(EnvironmentOperation::ClientIdentifier)
                .await
            {
                Ok(EnvironmentOutput::ClientIdentifier(identifier)) => {
                    Platform::classify(&identifier)
                }
                Ok(other) => {
                    warn!(output = ?other, "unexpected answer to client identifier request");
                    Platform::Desktop
                }
                Err(e) => {
                    warn!(error = %e, "client identifier unavailable");
                    Platform::Desktop
                }
            };
            context.update_app(make_event(platform));
        });
    }

    /// Clears the file input so the same file can be chosen again.
    pub fn reset_input_control(&self) {
        self.notify(EnvironmentOperation::ResetInputControl);
    }

    pub fn create_preview<F>(&self, image: &SelectedImage, make_event: F)
    where
        F: FnOnce(Result<String, EnvironmentError>) -> E + Send + 'static,
    {
        let operation = EnvironmentOperation::CreatePreview {
            image_id: image.id(),
            media_type: image.media_type().mime().to_string(),
            bytes: image.bytes().to_vec(),
        };
        let context = self.context.clone();
        self.context.spawn(async move {
            let url = match context.request_from_shell(operation).await {
                Ok(EnvironmentOutput::PreviewCreated { url }) => Ok(url),
                Ok(_) => Err(EnvironmentError::Failed {
                    reason: "shell did not return a preview URL".into(),
                }),
                Err(e) => Err(e),
            };
            context.update_app(make_event(url));
        });
    }

    pub fn release_preview(&self, url: String) {
        self.notify(EnvironmentOperation::ReleasePreview { url });
    }

    pub fn open_capture(&self) {
        self.notify(EnvironmentOperation::OpenCapture);
    }

    fn notify(&self, operation: EnvironmentOperation) {
        let context = self.context.clone();
        self.context.spawn(async move {
            if let Err(e) = context.request_from_shell(operation).await {
                warn!(error = %e, "environment operation failed");
            }
        });
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum EnvironmentOperation {
    ClientIdentifier,
    ResetInputControl,
    CreatePreview {
        image_id: ImageId,
        media_type: String,
        #[serde(with = "serde_bytes")]
        bytes: Vec<u8>,
    },
    ReleasePreview {
        url: String,
    },
    OpenCapture,
}

impl Operation for EnvironmentOperation {
    type Output = EnvironmentResult;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum EnvironmentOutput {
    ClientIdentifier(String),
    PreviewCreated { url: String },
    Done,
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum EnvironmentError {
    #[error("operation not supported by this shell: {operation}")]
    Unsupported { operation: String },

    #[error("environment operation failed: {reason}")]
    Failed { reason: String },
}

pub type EnvironmentResult = Result<EnvironmentOutput, EnvironmentError>;
