//! CLI argument parsing
//!
//! ```text
//! titanic [--config <file>] [--json-logs] <mode>
//!
//! MODES:
//!   train     Train, register and promote a new model version
//!   serve     Run the HTTP inference service
//!   predict   Ask the inference service for one prediction
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use titanic_core::ml_integration::PredictRequest;

/// Parsed CLI arguments
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(
    name = "titanic",
    version,
    about = "Train, serve and query the Titanic survival classifier"
)]
pub struct Args {
    /// TOML configuration file layered under the environment
    #[arg(long, global = true, env = "TITANIC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub mode: Mode,
}

/// CLI modes
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Mode {
    /// Train a new model version and promote it to Production
    Train {
        /// Print the training report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the HTTP inference service
    Serve,

    /// Ask the inference service for a survival prediction
    Predict(PredictArgs),
}

/// Passenger features for `predict`, defaulting to the form's initial values
#[derive(clap::Args, Debug, Clone, PartialEq)]
pub struct PredictArgs {
    /// Passenger class
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(i64).range(1..=3))]
    pub pclass: i64,

    /// male or female
    #[arg(long, default_value = "male")]
    pub sex: String,

    #[arg(long, default_value_t = 30.0)]
    pub age: f64,

    /// Siblings/spouses aboard
    #[arg(long, default_value_t = 0)]
    pub sibsp: i64,

    /// Parents/children aboard
    #[arg(long, default_value_t = 0)]
    pub parch: i64,

    #[arg(long, default_value_t = 32.0)]
    pub fare: f64,

    /// Port of embarkation (S, C or Q)
    #[arg(long, default_value = "S")]
    pub embarked: String,

    /// Inference service base URL, overriding API_BASE_URL
    #[arg(long)]
    pub api_url: Option<String>,
}

impl From<&PredictArgs> for PredictRequest {
    fn from(args: &PredictArgs) -> Self {
        PredictRequest {
            pclass: args.pclass,
            sex: args.sex.clone(),
            age: args.age,
            sibsp: args.sibsp,
            parch: args.parch,
            fare: args.fare,
            embarked: Some(args.embarked.clone()),
        }
    }
}
