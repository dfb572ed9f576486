// lib.rs - Leaf scanner core: upload, classify, present

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod app;
pub mod capabilities;
pub mod config;
pub mod detection;
pub mod error;
pub mod event;
pub mod media;
pub mod model;
pub mod upload;
pub mod view;

#[cfg(feature = "native")]
pub mod shell;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use config::ClientConfig;
pub use crux_core::render::Render;
pub use error::{AppError, ErrorKind, UserFacingError};
pub use event::{CandidateFile, Event, ImageId, RequestId};
pub use model::{Model, Notice};
pub use view::ViewModel;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:5000/detect";
pub const DEFAULT_FIELD_NAME: &str = "file";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const MIN_TIMEOUT_MS: u64 = 1_000;
pub const MAX_TIMEOUT_MS: u64 = 300_000;
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
pub const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

pub const DETECTION_FAILED_MESSAGE: &str = "Error during detection. Please try again.";
pub const CAPTURE_UNSUPPORTED_MESSAGE: &str = "Taking a photo is only supported on mobile devices.";
