//! CLI mode dispatch
//!
//! Loads [`Settings`] once and hands them to the selected mode:
//! - train: run the training workflow against the configured registry
//! - serve: run the inference service
//! - predict: query the inference service and render the outcome

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use titanic_api::ApiServer;
use titanic_core::config::Settings;
use titanic_core::ml_integration::{
    artifact_store_from_settings, registry_from_settings, PredictRequest, TrainingWorkflow,
};

use crate::cli::{Args, Mode, PredictArgs};
use crate::client::{render_outcome, PredictionClient};

/// Run the mode selected in `args`.
pub async fn run_cli_mode(args: Args) -> Result<()> {
    let settings =
        Settings::load(args.config.as_deref()).context("Failed to load configuration")?;

    match args.mode {
        Mode::Train { json } => train(&settings, json).await,
        Mode::Serve => serve(&settings).await,
        Mode::Predict(predict_args) => predict(&settings, &predict_args).await,
    }
}

async fn train(settings: &Settings, json: bool) -> Result<()> {
    let artifacts = artifact_store_from_settings(settings);
    let registry = registry_from_settings(settings, Arc::clone(&artifacts))
        .await
        .context("Failed to open model registry")?;

    let report = TrainingWorkflow::new(settings, registry, artifacts)
        .run()
        .await
        .context("Training run failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Run:       {}", report.run_id);
        println!("Model:     {} v{} (Production)", report.model_name, report.version);
        println!("Artifact:  {}", report.artifact);
        println!("Rows:      {} train / {} test", report.train_rows, report.test_rows);
        match report.test_accuracy {
            Some(accuracy) => println!("Accuracy:  {:.4}", accuracy),
            None => println!("Accuracy:  n/a"),
        }
    }
    Ok(())
}

async fn serve(settings: &Settings) -> Result<()> {
    let artifacts = artifact_store_from_settings(settings);
    let registry = registry_from_settings(settings, artifacts)
        .await
        .context("Failed to open model registry")?;
    info!(
        "Serving model '{}' (cache TTL {:?})",
        settings.model_name,
        settings.model_cache_ttl()
    );
    ApiServer::from_settings(settings, registry)?.start().await
}

async fn predict(settings: &Settings, args: &PredictArgs) -> Result<()> {
    let base_url = args.api_url.as_deref().unwrap_or(&settings.api_base_url);
    let client = PredictionClient::new(base_url)?;
    let response = client
        .predict(&PredictRequest::from(args))
        .await
        .context("Failed to reach prediction API")?;
    println!("{}", render_outcome(response.survived));
    Ok(())
}
