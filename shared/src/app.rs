use tracing::{debug, error, info, warn};

use crate::capabilities::{Capabilities, ClassifyRequest};
use crate::detection::{self, Completion, DetectionStatus};
use crate::error::{AppError, UserFacingError};
use crate::event::{CandidateFile, Event};
use crate::model::{Model, Notice};
use crate::upload::CaptureDecision;
use crate::view::{
    DetectionRow, DetectionView, SelectedFileView, UploadState, UploadView, ViewModel,
};
use crate::CAPTURE_UNSUPPORTED_MESSAGE;

#[derive(Default)]
pub struct App;

impl App {
    fn select_file(candidate: CandidateFile, model: &mut Model, caps: &Capabilities) {
        let change = match model.upload.select(candidate, model.config.max_image_bytes) {
            Ok(change) => change,
            Err(e) => {
                let err = AppError::from(e);
                model.notice = Some(Notice::from(&err));
                return;
            }
        };

        model.notice = None;
        if let Some(url) = change.released_preview {
            caps.environment.release_preview(url);
        }
        if let Some(image) = model.upload.selected() {
            let image_id = image.id();
            caps.environment
                .create_preview(image, move |result| Event::PreviewCreated { image_id, result });
        }

        if model.config.auto_detect {
            Self::detect(model, caps);
        } else {
            model.detection.reset();
        }
    }

    fn cancel_file(model: &mut Model, caps: &Capabilities) {
        let Some(change) = model.upload.cancel() else {
            debug!("cancel with nothing selected");
            return;
        };
        if let Some(url) = change.released_preview {
            caps.environment.release_preview(url);
        }
        caps.environment.reset_input_control();
        model.detection.reset();
    }

    /// Issues at most one classifier request for the current image.
    fn detect(model: &mut Model, caps: &Capabilities) {
        let Some(image) = model.upload.selected() else {
            debug!("scan requested without a selected image");
            return;
        };
        let Some(request_id) = model.detection.begin(image.id()) else {
            return;
        };

        let request = ClassifyRequest::new(request_id, &model.config, image);
        info!(
            request_id = %request_id,
            url = %request.url,
            size = request.body.len(),
            "submitting image for classification"
        );
        caps.classifier.submit(request, move |result| Event::ClassificationCompleted {
            request_id,
            result: Box::new(result),
        });
    }

    fn build_upload_view(model: &Model) -> UploadView {
        let upload = &model.upload;
        let file = upload.selected().map(|image| SelectedFileView {
            name: image.name().to_string(),
            size_label: image.size_label(),
            media_type: image.media_type().mime().to_string(),
            preview_url: upload.preview_url().map(str::to_string),
        });

        let state = match (&file, upload.is_hovering()) {
            (Some(_), _) => UploadState::Selected,
            (None, true) => UploadState::Hover,
            (None, false) => UploadState::Idle,
        };

        UploadView {
            state,
            can_capture: upload.platform().is_mobile() && file.is_none(),
            can_cancel: file.is_some(),
            can_scan: file.is_some()
                && !matches!(
                    model.detection.status(),
                    DetectionStatus::Pending | DetectionStatus::Succeeded
                ),
            file,
        }
    }

    fn build_detection_view(model: &Model) -> DetectionView {
        let detection = &model.detection;
        let results = detection.results();

        DetectionView {
            status: detection.status(),
            is_loading: detection.status() == DetectionStatus::Pending,
            modal_visible: detection.is_modal_visible(),
            error: detection.error().map(UserFacingError::from),
            annotated_image_url: results
                .and_then(detection::ResultSet::annotated_image)
                .map(crate::media::AnnotatedImage::data_url),
            detections: results
                .map(|r| r.detections().iter().map(DetectionRow::from).collect())
                .unwrap_or_default(),
        }
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        debug!(event = event.name(), user = event.is_user_initiated(), "update");

        match event {
            Event::Mounted => {
                caps.environment
                    .is_mobile_client(|platform| Event::PlatformDetected { platform });
            }

            Event::Unmounted => {
                if let Some(url) = model.upload.release_preview() {
                    caps.environment.release_preview(url);
                }
            }

            Event::Configure(config) => match config.validated() {
                Ok(config) => {
                    info!(endpoint = %config.endpoint, timeout_ms = config.timeout_ms, "configuration applied");
                    model.config = config;
                }
                Err(e) => {
                    error!(error = %e, "configuration rejected, keeping previous");
                    model.notice = Some(Notice::from(&AppError::from(e)));
                }
            },

            Event::PlatformDetected { platform } => {
                info!(platform = ?platform, "platform detected");
                model.upload.set_platform(platform);
            }

            Event::FileSelected(candidate) => Self::select_file(candidate, model, caps),

            Event::FileCancelled => Self::cancel_file(model, caps),

            Event::DragHoverChanged { active } => model.upload.set_hovering(active),

            Event::CaptureRequested => match model.upload.request_capture() {
                CaptureDecision::OpenCamera => caps.environment.open_capture(),
                CaptureDecision::Unsupported => {
                    model.notice = Some(Notice::info(CAPTURE_UNSUPPORTED_MESSAGE));
                }
                CaptureDecision::Ignored => debug!("capture ignored while a file is selected"),
            },

            Event::ScanRequested => Self::detect(model, caps),

            Event::ModalDismissed => {
                if !model.detection.dismiss() {
                    return;
                }
            }

            Event::NoticeDismissed => model.notice = None,

            Event::PreviewCreated { image_id, result } => match result {
                Ok(url) => {
                    if let Some(stale) = model.upload.attach_preview(image_id, url) {
                        caps.environment.release_preview(stale);
                        return;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "preview unavailable");
                    return;
                }
            },

            Event::ClassificationCompleted { request_id, result } => {
                if model.detection.pending_request() != Some(request_id) {
                    warn!(request_id = %request_id, "dropping response for superseded request");
                    return;
                }
                let outcome = detection::interpret(*result);
                if model.detection.complete(request_id, outcome) == Completion::Stale {
                    return;
                }
            }
        }

        caps.render.render();
    }

    fn view(&self, model: &Model) -> ViewModel {
        ViewModel {
            upload: Self::build_upload_view(model),
            detection: Self::build_detection_view(model),
            notice: model.notice.clone(),
        }
    }
}
