//! Native reference shell for the classifier capability.
//!
//! Web and mobile shells answer [`ClassifierOperation`]s with their own HTTP
//! stacks; this module does the same with `reqwest` so the core can run
//! headless (tools, integration tests, desktop wrappers).

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use tracing::{debug, instrument, warn};

use crate::capabilities::{
    ClassifierOperation, ClassifierResult, ClassifyRequest, HttpError, HttpResponse,
};
use crate::config::{ClientConfig, ConfigError};

/// Reads `LEAFSCAN_*` overrides from the process environment.
pub fn config_from_env() -> Result<ClientConfig, ConfigError> {
    ClientConfig::from_lookup(|key| std::env::var(key).ok())
}

pub struct NativeClassifier {
    client: reqwest::Client,
}

impl NativeClassifier {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn resolve(&self, operation: &ClassifierOperation) -> ClassifierResult {
        match operation {
            ClassifierOperation::Submit(request) => self.submit(request).await,
        }
    }

    #[instrument(skip(self, request), fields(request_id = %request.request_id, size = request.body.len()))]
    pub async fn submit(&self, request: &ClassifyRequest) -> ClassifierResult {
        let part = Part::bytes(request.body.clone())
            .file_name(request.file_name.clone())
            .mime_str(&request.media_type)
            .map_err(|e| HttpError::InvalidRequest {
                reason: e.to_string(),
            })?;
        let form = Form::new().part(request.field_name.clone(), part);

        let response = self
            .client
            .post(&request.url)
            .multipart(form)
            .timeout(Duration::from_millis(request.timeout_ms))
            .send()
            .await
            .map_err(|e| map_transport_error(&e, request.timeout_ms))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| map_transport_error(&e, request.timeout_ms))?;

        debug!(status, body_bytes = body.len(), "classifier answered");
        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

impl Default for NativeClassifier {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

fn map_transport_error(e: &reqwest::Error, timeout_ms: u64) -> HttpError {
    if e.is_timeout() {
        warn!(timeout_ms, "classifier request timed out");
        HttpError::Timeout { timeout_ms }
    } else if e.is_builder() {
        HttpError::InvalidRequest {
            reason: e.to_string(),
        }
    } else {
        warn!(error = %e, "classifier request failed");
        HttpError::Network {
            message: e.to_string(),
        }
    }
}
