//! Titanic MLOps: command-line entry point
//!
//! Wires the training workflow, the inference service and the prediction
//! client behind one binary.

pub mod cli;
pub mod client;

pub use client::{fallback_targets, render_outcome, ClientError, PredictionClient};
