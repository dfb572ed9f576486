#![allow(dead_code)]

use crux_core::testing::AppTester;
use crux_core::Request;
use shared::capabilities::{ClassifierOperation, EnvironmentOperation};
use shared::{App, CandidateFile, Effect, Event, Model};

pub const JPEG_BYTES: [u8; 13] = [
    0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x01, 0x01,
];
pub const PNG_BYTES: [u8; 12] = [
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D,
];
pub const GIF_BYTES: [u8; 12] = [
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00,
];

/// Base64 of `JPEG_BYTES`.
pub const JPEG_BASE64: &str = "/9j/4AAQSkZJRgABAQ==";

pub fn jpeg(name: &str) -> CandidateFile {
    CandidateFile::new(name, "image/jpeg", JPEG_BYTES.to_vec())
}

pub fn png(name: &str) -> CandidateFile {
    CandidateFile::new(name, "image/png", PNG_BYTES.to_vec())
}

pub fn gif(name: &str) -> CandidateFile {
    CandidateFile::new(name, "image/gif", GIF_BYTES.to_vec())
}

pub fn arabica_rust_body() -> Vec<u8> {
    format!(
        r#"{{"detections": [{{"leaf_class":"Arabica","leaf_confidence":0.97,"disease_class":"Rust","disease_confidence":0.88,"bbox":[1.0,2.0,3.0,4.0]}}], "image": "{JPEG_BASE64}"}}"#
    )
    .into_bytes()
}

pub fn classifier_requests(effects: Vec<Effect>) -> Vec<Request<ClassifierOperation>> {
    effects
        .into_iter()
        .filter_map(|e| match e {
            Effect::Classifier(request) => Some(request),
            _ => None,
        })
        .collect()
}

pub fn environment_requests(effects: Vec<Effect>) -> Vec<Request<EnvironmentOperation>> {
    effects
        .into_iter()
        .filter_map(|e| match e {
            Effect::Environment(request) => Some(request),
            _ => None,
        })
        .collect()
}

pub fn has_render(effects: &[Effect]) -> bool {
    effects.iter().any(|e| matches!(e, Effect::Render(_)))
}

/// Selects `file` and returns the single classifier request it produced.
pub fn select_and_take_request(
    app: &AppTester<App, Effect>,
    model: &mut Model,
    file: CandidateFile,
) -> Request<ClassifierOperation> {
    let update = app.update(Event::FileSelected(file), model);
    let mut requests = classifier_requests(update.effects);
    assert_eq!(requests.len(), 1, "selection should issue exactly one request");
    requests.remove(0)
}

/// Feeds every event produced by resolving a request back into the app.
pub fn apply_events(app: &AppTester<App, Effect>, model: &mut Model, events: Vec<Event>) -> Vec<Effect> {
    let mut effects = Vec::new();
    for event in events {
        effects.extend(app.update(event, model).effects);
    }
    effects
}
