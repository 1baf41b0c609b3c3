//! Dataset Loading
//!
//! Reads the Titanic CSV from an http(s) URL or a local path into passenger
//! records and labels. Column names are matched case-insensitively and
//! columns outside the feature list are ignored.

use polars::prelude::*;
use std::collections::HashMap;
use std::io::Cursor;
use tracing::{debug, info};

use crate::error::DataLoadError;
use crate::ml_integration::metadata::{PassengerRecord, LABEL_COLUMN, TITANIC_FEATURES};

/// Passenger records with their binary `survived` labels.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TitanicDataset {
    pub records: Vec<PassengerRecord>,
    pub labels: Vec<usize>,
}

impl TitanicDataset {
    pub fn new(records: Vec<PassengerRecord>, labels: Vec<usize>) -> Result<Self, DataLoadError> {
        if records.len() != labels.len() {
            return Err(DataLoadError::Parse(format!(
                "{} records but {} labels",
                records.len(),
                labels.len()
            )));
        }
        Ok(Self { records, labels })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows at `indices`, in the order given.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            records: indices.iter().map(|&i| self.records[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    /// Share of rows labelled as survived.
    pub fn positive_rate(&self) -> f64 {
        if self.labels.is_empty() {
            return 0.0;
        }
        self.labels.iter().filter(|&&label| label == 1).count() as f64 / self.labels.len() as f64
    }
}

/// Fetch and parse the dataset at `source`.
pub async fn load_dataset(source: &str) -> Result<TitanicDataset, DataLoadError> {
    info!("Loading dataset from {}", source);
    let bytes = fetch_source(source).await?;
    let dataset = parse_csv(bytes)?;
    info!(
        "Loaded {} rows (survival rate {:.3})",
        dataset.len(),
        dataset.positive_rate()
    );
    Ok(dataset)
}

async fn fetch_source(source: &str) -> Result<Vec<u8>, DataLoadError> {
    let unreachable = |reason: String| DataLoadError::Unreachable {
        source_location: source.to_string(),
        reason,
    };

    if source.starts_with("http://") || source.starts_with("https://") {
        let response = reqwest::get(source)
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| unreachable(e.to_string()))?;
        let body = response
            .bytes()
            .await
            .map_err(|e| unreachable(e.to_string()))?;
        Ok(body.to_vec())
    } else {
        tokio::fs::read(source)
            .await
            .map_err(|e| unreachable(e.to_string()))
    }
}

/// Parse CSV bytes into a dataset.
pub fn parse_csv(bytes: Vec<u8>) -> Result<TitanicDataset, DataLoadError> {
    // Whole-file inference so a late fractional value does not hit an integer column.
    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
        .map_err(|e| DataLoadError::Parse(e.to_string()))?;

    // First occurrence wins when two headers differ only by case.
    let mut columns: HashMap<String, &Series> = HashMap::new();
    for series in frame.get_columns() {
        columns.entry(series.name().to_lowercase()).or_insert(series);
    }

    let missing: Vec<String> = TITANIC_FEATURES
        .iter()
        .chain(std::iter::once(&LABEL_COLUMN))
        .filter(|name| !columns.contains_key(**name))
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(DataLoadError::MissingColumns(missing));
    }

    if frame.height() == 0 {
        return Err(DataLoadError::Empty);
    }
    debug!("Parsed frame with shape {:?}", frame.shape());

    let pclass = float_column(columns["pclass"])?;
    let sex = string_column(columns["sex"])?;
    let age = float_column(columns["age"])?;
    let sibsp = float_column(columns["sibsp"])?;
    let parch = float_column(columns["parch"])?;
    let fare = float_column(columns["fare"])?;
    let embarked = string_column(columns["embarked"])?;
    let survived = float_column(columns[LABEL_COLUMN])?;

    let mut records = Vec::with_capacity(frame.height());
    let mut labels = Vec::with_capacity(frame.height());
    for row in 0..frame.height() {
        let label = survived[row].ok_or(DataLoadError::MissingLabel { row })?;
        labels.push(usize::from(label != 0.0));
        records.push(PassengerRecord {
            pclass: pclass[row].map(|v| v.round() as i64),
            sex: sex[row].as_ref().map(|v| v.to_lowercase()),
            age: age[row],
            sibsp: sibsp[row].map(|v| v.round() as i64),
            parch: parch[row].map(|v| v.round() as i64),
            fare: fare[row],
            embarked: embarked[row].as_ref().map(|v| v.to_uppercase()),
        });
    }

    TitanicDataset::new(records, labels)
}

fn float_column(series: &Series) -> Result<Vec<Option<f64>>, DataLoadError> {
    let parse_err = |e: PolarsError| DataLoadError::Parse(format!("{}: {}", series.name(), e));
    let cast = series.cast(&DataType::Float64).map_err(parse_err)?;
    let values = cast.f64().map_err(parse_err)?;
    Ok(values.into_iter().collect())
}

fn string_column(series: &Series) -> Result<Vec<Option<String>>, DataLoadError> {
    let parse_err = |e: PolarsError| DataLoadError::Parse(format!("{}: {}", series.name(), e));
    let cast = series.cast(&DataType::String).map_err(parse_err)?;
    let values = cast.str().map_err(parse_err)?;
    Ok(values
        .into_iter()
        .map(|value| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        })
        .collect())
}
