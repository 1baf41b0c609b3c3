//! Inference: request normalization and Production model resolution.

pub mod request;
pub mod resolver;

pub use request::PredictRequest;
pub use resolver::{ModelResolver, Prediction, ResolvedModel};
