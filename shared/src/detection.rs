//! Classification round-trip state machine and result parsing.
//!
//! Lifecycle: `Idle -> Pending -> Succeeded | Failed`, back to `Pending` on a
//! new image and to `Idle` on dismissal or cancellation. Only the response
//! carrying the current pending [`RequestId`] is ever applied.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::capabilities::{ClassifierResult, HttpError};
use crate::error::{AppError, ErrorKind};
use crate::event::{ImageId, RequestId};
use crate::media::AnnotatedImage;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DetectionError {
    #[error("network failure: {0}")]
    Network(String),

    #[error("classifier did not answer within {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("classifier returned HTTP {status}")]
    Status {
        status: u16,
        service_message: Option<String>,
    },

    #[error("malformed classifier response: {0}")]
    Malformed(String),
}

impl DetectionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::Network,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Status { .. } => ErrorKind::HttpStatus,
            Self::Malformed(_) => ErrorKind::MalformedResponse,
        }
    }
}

impl From<HttpError> for DetectionError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Timeout { timeout_ms } => Self::Timeout { timeout_ms },
            HttpError::Network { message } => Self::Network(message),
            HttpError::InvalidRequest { reason } => Self::Network(reason),
        }
    }
}

impl From<DetectionError> for AppError {
    fn from(e: DetectionError) -> Self {
        let err = AppError::new(e.kind(), e.to_string());
        match e {
            DetectionError::Status {
                status,
                service_message,
            } => {
                let err = err.with_context("http_status", status.to_string());
                match service_message {
                    Some(message) => err.with_internal(message),
                    None => err,
                }
            }
            _ => err,
        }
    }
}

/// One classified region, exactly as the service reported it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub leaf_class: String,
    pub leaf_confidence: f64,
    pub disease_class: String,
    pub disease_confidence: f64,
    /// Coordinates in the service's own convention, passed through untouched.
    pub bbox: [f64; 4],
}

impl Detection {
    fn validate(&self, index: usize) -> Result<(), DetectionError> {
        for (field, value) in [
            ("leaf_confidence", self.leaf_confidence),
            ("disease_confidence", self.disease_confidence),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(DetectionError::Malformed(format!(
                    "detection {index}: {field} {value} is outside [0, 1]"
                )));
            }
        }
        if self.bbox.iter().any(|c| !c.is_finite()) {
            return Err(DetectionError::Malformed(format!(
                "detection {index}: bbox has a non-finite coordinate"
            )));
        }
        Ok(())
    }

    pub fn leaf_line(&self) -> String {
        format_confidence(&self.leaf_class, self.leaf_confidence)
    }

    pub fn disease_line(&self) -> String {
        format_confidence(&self.disease_class, self.disease_confidence)
    }

    pub fn bbox_line(&self) -> String {
        format_bbox(&self.bbox)
    }
}

/// `"<label> (Confidence: NN.NN%)"`
pub fn format_confidence(label: &str, confidence: f64) -> String {
    format!("{label} (Confidence: {:.2}%)", confidence * 100.0)
}

/// `"(x1, x2, x3, x4)"` with two decimals each, in the order received.
pub fn format_bbox(bbox: &[f64; 4]) -> String {
    let coords: Vec<String> = bbox.iter().map(|c| format!("{c:.2}")).collect();
    format!("({})", coords.join(", "))
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSet {
    detections: Vec<Detection>,
    annotated_image: Option<AnnotatedImage>,
}

impl ResultSet {
    /// Parses a classifier response body.
    ///
    /// The body must be a JSON object whose `detections` member is an array
    /// of well-formed entries. `image` is optional; a bad overlay is dropped
    /// without failing the whole result.
    pub fn parse(body: &[u8]) -> Result<Self, DetectionError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| DetectionError::Malformed(format!("body is not JSON: {e}")))?;

        let object = value
            .as_object()
            .ok_or_else(|| DetectionError::Malformed("body is not a JSON object".into()))?;

        let entries = object
            .get("detections")
            .and_then(Value::as_array)
            .ok_or_else(|| DetectionError::Malformed("missing detections array".into()))?;

        let detections = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let detection = Detection::deserialize(entry).map_err(|e| {
                    DetectionError::Malformed(format!("detection {index}: {e}"))
                })?;
                detection.validate(index)?;
                Ok(detection)
            })
            .collect::<Result<Vec<_>, DetectionError>>()?;

        let annotated_image = match object.get("image") {
            None | Some(Value::Null) => None,
            Some(Value::String(encoded)) => match AnnotatedImage::from_base64(encoded) {
                Ok(image) => Some(image),
                Err(e) => {
                    warn!(error = %e, "dropping undecodable annotated image");
                    None
                }
            },
            Some(_) => {
                warn!("dropping annotated image that is not a string");
                None
            }
        };

        Ok(Self {
            detections,
            annotated_image,
        })
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn annotated_image(&self) -> Option<&AnnotatedImage> {
        self.annotated_image.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

/// Turns whatever the shell reported into a result set or a classified
/// failure.
pub fn interpret(result: ClassifierResult) -> Result<ResultSet, DetectionError> {
    let response = result?;
    if !response.is_success() {
        return Err(DetectionError::Status {
            status: response.status,
            service_message: response.service_error(),
        });
    }
    ResultSet::parse(&response.body)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionStatus {
    #[default]
    Idle,
    Pending,
    Succeeded,
    Failed,
}

#[derive(Debug, Default)]
enum Phase {
    #[default]
    Idle,
    Pending {
        request_id: RequestId,
        image_id: ImageId,
    },
    Succeeded {
        image_id: ImageId,
        results: ResultSet,
    },
    Failed {
        image_id: ImageId,
        error: AppError,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    Applied(DetectionStatus),
    Stale,
}

#[derive(Debug, Default)]
pub struct DetectionController {
    phase: Phase,
    modal_visible: bool,
}

impl DetectionController {
    /// Starts a request for `image_id` unless that same image is already
    /// pending or already has results. Any earlier pending request becomes
    /// stale.
    pub fn begin(&mut self, image_id: ImageId) -> Option<RequestId> {
        match &self.phase {
            Phase::Pending {
                image_id: pending, ..
            } if *pending == image_id => {
                debug!(image_id = %image_id, "detection already pending for image");
                return None;
            }
            Phase::Succeeded {
                image_id: done, ..
            } if *done == image_id => {
                debug!(image_id = %image_id, "image already classified");
                return None;
            }
            _ => {}
        }

        let request_id = RequestId::generate();
        info!(request_id = %request_id, image_id = %image_id, "detection pending");
        self.phase = Phase::Pending {
            request_id,
            image_id,
        };
        self.modal_visible = false;
        Some(request_id)
    }

    /// Applies the outcome of `request_id` if it is still the pending request.
    pub fn complete(
        &mut self,
        request_id: RequestId,
        outcome: Result<ResultSet, DetectionError>,
    ) -> Completion {
        let image_id = match &self.phase {
            Phase::Pending {
                request_id: pending,
                image_id,
            } if *pending == request_id => *image_id,
            _ => {
                debug!(request_id = %request_id, "ignoring stale classifier response");
                return Completion::Stale;
            }
        };

        self.modal_visible = true;
        match outcome {
            Ok(results) => {
                info!(
                    request_id = %request_id,
                    detections = results.detections().len(),
                    annotated = results.annotated_image().is_some(),
                    "detection succeeded"
                );
                self.phase = Phase::Succeeded { image_id, results };
                Completion::Applied(DetectionStatus::Succeeded)
            }
            Err(e) => {
                let error = AppError::from(e);
                warn!(request_id = %request_id, code = error.code(), error = %error, "detection failed");
                self.phase = Phase::Failed { image_id, error };
                Completion::Applied(DetectionStatus::Failed)
            }
        }
    }

    /// Closes the results modal and returns to `Idle`, discarding the result.
    pub fn dismiss(&mut self) -> bool {
        match self.phase {
            Phase::Succeeded { .. } | Phase::Failed { .. } => {
                self.phase = Phase::Idle;
                self.modal_visible = false;
                true
            }
            Phase::Idle | Phase::Pending { .. } => false,
        }
    }

    /// Forgets everything, e.g. when the source file is cancelled. A request
    /// still in flight will be ignored when it lands.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.modal_visible = false;
    }

    pub fn status(&self) -> DetectionStatus {
        match self.phase {
            Phase::Idle => DetectionStatus::Idle,
            Phase::Pending { .. } => DetectionStatus::Pending,
            Phase::Succeeded { .. } => DetectionStatus::Succeeded,
            Phase::Failed { .. } => DetectionStatus::Failed,
        }
    }

    pub fn pending_request(&self) -> Option<RequestId> {
        match self.phase {
            Phase::Pending { request_id, .. } => Some(request_id),
            _ => None,
        }
    }

    pub fn image_id(&self) -> Option<ImageId> {
        match &self.phase {
            Phase::Idle => None,
            Phase::Pending { image_id, .. }
            | Phase::Succeeded { image_id, .. }
            | Phase::Failed { image_id, .. } => Some(*image_id),
        }
    }

    pub fn results(&self) -> Option<&ResultSet> {
        match &self.phase {
            Phase::Succeeded { results, .. } => Some(results),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&AppError> {
        match &self.phase {
            Phase::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_modal_visible(&self) -> bool {
        self.modal_visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::HttpResponse;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    const ARABICA_RUST: &str = r#"{"detections": [{"leaf_class":"Arabica","leaf_confidence":0.97,"disease_class":"Rust","disease_confidence":0.88,"bbox":[1.0,2.0,3.0,4.0]}], "image": "/9j/4AAQSkZJRgABAQ=="}"#;

    #[test]
    fn parses_well_formed_response() {
        let results = ResultSet::parse(ARABICA_RUST.as_bytes()).unwrap();
        assert_eq!(results.detections().len(), 1);

        let detection = &results.detections()[0];
        assert_eq!(detection.leaf_line(), "Arabica (Confidence: 97.00%)");
        assert_eq!(detection.disease_line(), "Rust (Confidence: 88.00%)");
        assert_eq!(detection.bbox_line(), "(1.00, 2.00, 3.00, 4.00)");
        assert!(results.annotated_image().is_some());
    }

    #[test]
    fn preserves_service_order() {
        let body = r#"{"detections": [
            {"leaf_class":"Robusta","leaf_confidence":0.5,"disease_class":"leaf_miner","disease_confidence":0.4,"bbox":[10,20,30,40]},
            {"leaf_class":"Liberica","leaf_confidence":0.6,"disease_class":"leaf_rust","disease_confidence":0.3,"bbox":[1,2,3,4]}
        ]}"#;
        let results = ResultSet::parse(body.as_bytes()).unwrap();
        let labels: Vec<&str> = results
            .detections()
            .iter()
            .map(|d| d.leaf_class.as_str())
            .collect();
        assert_eq!(labels, ["Robusta", "Liberica"]);
        assert_eq!(results.detections()[0].bbox_line(), "(10.00, 20.00, 30.00, 40.00)");
        assert!(results.annotated_image().is_none());
    }

    #[test]
    fn empty_detections_is_success() {
        let results = ResultSet::parse(br#"{"detections": []}"#).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn missing_detections_is_malformed() {
        assert_matches!(
            ResultSet::parse(br#"{"unexpected": true}"#),
            Err(DetectionError::Malformed(reason)) if reason.contains("detections")
        );
    }

    #[test]
    fn non_array_detections_is_malformed() {
        assert_matches!(
            ResultSet::parse(br#"{"detections": {"leaf_class": "Arabica"}}"#),
            Err(DetectionError::Malformed(_))
        );
    }

    #[test]
    fn non_json_is_malformed() {
        assert_matches!(
            ResultSet::parse(b"<html>502 Bad Gateway</html>"),
            Err(DetectionError::Malformed(_))
        );
        assert_matches!(ResultSet::parse(b"[]"), Err(DetectionError::Malformed(_)));
    }

    #[test]
    fn short_bbox_is_malformed() {
        let body = r#"{"detections": [{"leaf_class":"Arabica","leaf_confidence":0.9,"disease_class":"Rust","disease_confidence":0.8,"bbox":[1.0,2.0,3.0]}]}"#;
        assert_matches!(
            ResultSet::parse(body.as_bytes()),
            Err(DetectionError::Malformed(reason)) if reason.starts_with("detection 0")
        );
    }

    #[test]
    fn out_of_range_confidence_is_malformed() {
        let body = r#"{"detections": [{"leaf_class":"Arabica","leaf_confidence":1.5,"disease_class":"Rust","disease_confidence":0.8,"bbox":[1,2,3,4]}]}"#;
        assert_matches!(
            ResultSet::parse(body.as_bytes()),
            Err(DetectionError::Malformed(reason)) if reason.contains("leaf_confidence")
        );
    }

    #[test]
    fn bad_overlay_keeps_detections() {
        let body = r#"{"detections": [{"leaf_class":"Arabica","leaf_confidence":0.9,"disease_class":"Rust","disease_confidence":0.8,"bbox":[1,2,3,4]}], "image": "%%%"}"#;
        let results = ResultSet::parse(body.as_bytes()).unwrap();
        assert_eq!(results.detections().len(), 1);
        assert!(results.annotated_image().is_none());
    }

    #[test]
    fn interpret_maps_transport_failures() {
        assert_matches!(
            interpret(Err(HttpError::Timeout { timeout_ms: 30_000 })),
            Err(DetectionError::Timeout { timeout_ms: 30_000 })
        );
        assert_matches!(
            interpret(Err(HttpError::Network {
                message: "connection refused".into()
            })),
            Err(DetectionError::Network(_))
        );
    }

    #[test]
    fn interpret_maps_status_with_service_message() {
        let response = HttpResponse::new(400, br#"{"error": "No file part in the request"}"#.to_vec());
        let err = interpret(Ok(response)).unwrap_err();
        assert_eq!(
            err,
            DetectionError::Status {
                status: 400,
                service_message: Some("No file part in the request".into())
            }
        );
        let app_err = AppError::from(err);
        assert_eq!(app_err.kind, ErrorKind::HttpStatus);
        assert_eq!(app_err.internal_message.as_deref(), Some("No file part in the request"));
    }

    #[test]
    fn controller_happy_path() {
        let mut controller = DetectionController::default();
        let image = ImageId::generate();
        assert_eq!(controller.status(), DetectionStatus::Idle);

        let request = controller.begin(image).unwrap();
        assert_eq!(controller.status(), DetectionStatus::Pending);
        assert!(!controller.is_modal_visible());

        let results = ResultSet::parse(ARABICA_RUST.as_bytes()).unwrap();
        assert_eq!(
            controller.complete(request, Ok(results)),
            Completion::Applied(DetectionStatus::Succeeded)
        );
        assert!(controller.is_modal_visible());
        assert_eq!(controller.results().unwrap().detections().len(), 1);
        assert_eq!(controller.image_id(), Some(image));
    }

    #[test]
    fn controller_suppresses_duplicate_begin() {
        let mut controller = DetectionController::default();
        let image = ImageId::generate();
        let first = controller.begin(image).unwrap();
        assert_eq!(controller.begin(image), None);
        assert_eq!(controller.pending_request(), Some(first));
    }

    #[test]
    fn controller_failure_clears_results() {
        let mut controller = DetectionController::default();
        let request = controller.begin(ImageId::generate()).unwrap();
        controller.complete(request, Err(DetectionError::Malformed("missing detections array".into())));

        assert_eq!(controller.status(), DetectionStatus::Failed);
        assert!(controller.results().is_none());
        assert!(controller.is_modal_visible());
        assert_eq!(
            controller.error().unwrap().kind,
            ErrorKind::MalformedResponse
        );
    }

    #[test]
    fn controller_ignores_superseded_response() {
        let mut controller = DetectionController::default();
        let first = controller.begin(ImageId::generate()).unwrap();
        let second = controller.begin(ImageId::generate()).unwrap();

        assert_eq!(controller.complete(first, Ok(ResultSet::default())), Completion::Stale);
        assert_eq!(controller.status(), DetectionStatus::Pending);
        assert_eq!(controller.pending_request(), Some(second));
    }

    #[test]
    fn controller_ignores_response_after_reset() {
        let mut controller = DetectionController::default();
        let request = controller.begin(ImageId::generate()).unwrap();
        controller.reset();
        assert_eq!(controller.complete(request, Ok(ResultSet::default())), Completion::Stale);
        assert_eq!(controller.status(), DetectionStatus::Idle);
    }

    #[test]
    fn dismiss_returns_to_idle() {
        let mut controller = DetectionController::default();
        assert!(!controller.dismiss());

        let request = controller.begin(ImageId::generate()).unwrap();
        assert!(!controller.dismiss());

        controller.complete(request, Ok(ResultSet::default()));
        assert!(controller.dismiss());
        assert_eq!(controller.status(), DetectionStatus::Idle);
        assert!(!controller.is_modal_visible());
        assert!(controller.results().is_none());
    }

    #[test]
    fn classified_image_is_not_resubmitted() {
        let mut controller = DetectionController::default();
        let image = ImageId::generate();
        let request = controller.begin(image).unwrap();
        controller.complete(request, Ok(ResultSet::default()));

        assert_eq!(controller.begin(image), None);
        assert_eq!(controller.status(), DetectionStatus::Succeeded);
        assert!(controller.begin(ImageId::generate()).is_some());
    }

    #[test]
    fn failed_image_can_be_resubmitted() {
        let mut controller = DetectionController::default();
        let image = ImageId::generate();
        let request = controller.begin(image).unwrap();
        controller.complete(request, Err(DetectionError::Network("refused".into())));
        assert!(controller.begin(image).is_some());
    }

    proptest! {
        #[test]
        fn confidence_always_has_two_decimals(c in 0.0f64..=1.0) {
            let line = format_confidence("Arabica", c);
            prop_assert!(line.starts_with("Arabica (Confidence: "));
            prop_assert!(line.ends_with("%)"));
            let number = line
                .trim_start_matches("Arabica (Confidence: ")
                .trim_end_matches("%)");
            let (_, decimals) = number.split_once('.').unwrap();
            prop_assert_eq!(decimals.len(), 2);
        }

        #[test]
        fn bbox_keeps_order_and_arity(coords in prop::array::uniform4(-1.0e6f64..1.0e6)) {
            let line = format_bbox(&coords);
            let inner = line.trim_start_matches('(').trim_end_matches(')');
            let parts: Vec<&str> = inner.split(", ").collect();
            prop_assert_eq!(parts.len(), 4);
            for (part, coord) in parts.iter().zip(coords.iter()) {
                prop_assert_eq!(*part, format!("{coord:.2}"));
            }
        }
    }
}
