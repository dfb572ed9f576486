mod classifier;
mod environment;

pub use self::classifier::{
    ClassifierOperation, ClassifierResult, ClassifyRequest, HttpError, HttpResponse,
};
pub use self::environment::{
    EnvironmentError, EnvironmentOperation, EnvironmentOutput, EnvironmentResult,
};

// Crux's built-in Render covers view updates; no wrapper needed.
pub use crux_core::render::Render;

use crate::event::Event;
#[allow(unused_imports)]
use crate::App;

pub use self::classifier::Classifier;
pub use self::environment::Environment;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub render: Render<Event>,
    pub classifier: Classifier<Event>,
    pub environment: Environment<Event>,
}
