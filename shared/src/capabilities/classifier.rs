use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::ClientConfig;
use crate::event::RequestId;
use crate::upload::SelectedImage;

/// Shell-side HTTP for the one outbound call the app makes: a multipart POST
/// of the selected image to the classification endpoint.
pub struct Classifier<E> {
    context: CapabilityContext<ClassifierOperation, E>,
}

impl<Ev> Capability<Ev> for Classifier<Ev> {
    type Operation = ClassifierOperation;
    type MappedSelf<MappedEv> = Classifier<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Classifier::new(self.context.map_event(f))
    }
}

impl<E> Classifier<E>
where
    E: 'static,
{
    pub fn new(context: CapabilityContext<ClassifierOperation, E>) -> Self {
        Self { context }
    }

    /// Asks the shell to perform `request`; the outcome comes back as the
    /// event built by `make_event`. There is no retry.
    pub fn submit<F>(&self, request: ClassifyRequest, make_event: F)
    where
        F: FnOnce(ClassifierResult) -> E + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let result = context
                .request_from_shell(ClassifierOperation::Submit(request))
                .await;
            context.update_app(make_event(result));
        });
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClassifierOperation {
    Submit(ClassifyRequest),
}

impl Operation for ClassifierOperation {
    type Output = ClassifierResult;
}

/// Everything the shell needs to build the multipart request.
///
/// `timeout_ms` is a hard bound; the shell must answer with
/// [`HttpError::Timeout`] once it elapses.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassifyRequest {
    pub request_id: RequestId,
    pub url: String,
    pub field_name: String,
    pub file_name: String,
    pub media_type: String,
    #[serde(with = "serde_bytes")]
    pub body: Vec<u8>,
    pub timeout_ms: u64,
}

impl ClassifyRequest {
    pub fn new(request_id: RequestId, config: &ClientConfig, image: &SelectedImage) -> Self {
        Self {
            request_id,
            url: config.endpoint.clone(),
            field_name: config.field_name.clone(),
            file_name: image.name().to_string(),
            media_type: image.media_type().mime().to_string(),
            body: image.bytes().to_vec(),
            timeout_ms: config.timeout_ms,
        }
    }
}

impl fmt::Debug for ClassifyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifyRequest")
            .field("request_id", &self.request_id)
            .field("url", &self.url)
            .field("field_name", &self.field_name)
            .field("file_name", &self.file_name)
            .field("media_type", &self.media_type)
            .field("body_bytes", &self.body.len())
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    #[serde(with = "serde_bytes")]
    pub body: Vec<u8>,
}

#[derive(Deserialize)]
struct ServiceErrorBody {
    error: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The `{"error": "..."}` message the service puts on rejected uploads.
    pub fn service_error(&self) -> Option<String> {
        serde_json::from_slice::<ServiceErrorBody>(&self.body)
            .ok()
            .map(|b| b.error)
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum HttpError {
    #[error("network error: {message}")]
    Network { message: String },

    #[error("request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("request could not be built: {reason}")]
    InvalidRequest { reason: String },
}

pub type ClassifierResult = Result<HttpResponse, HttpError>;
