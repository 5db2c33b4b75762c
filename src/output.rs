//! CSV persistence for prediction results.

use anyhow::Result;
use tracing::debug;

use crate::types::PredictionResult;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Appends a [`PredictionResult`] as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &str, result: &PredictionResult) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    writer.serialize(result)?;
    writer.flush()?;

    Ok(())
}
