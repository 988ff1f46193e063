//! CSV input rows and prediction output.

use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use backstory_core::types::{PredictionRecord, SourceId, VerificationRequest};

pub const OUTPUT_HEADERS: [&str; 3] = ["Story ID", "Prediction", "Rationale"];

/// One input row; absent cells read as empty.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InputRow {
    pub id: String,
    pub book_name: String,
    #[serde(rename = "char")]
    pub character: String,
    pub caption: String,
    pub content: Option<String>,
    pub backstory: Option<String>,
}

impl InputRow {
    /// `content`, or `backstory` when `content` is absent.
    pub fn claim(&self) -> &str {
        self.content.as_deref().or(self.backstory.as_deref()).unwrap_or_default()
    }

    pub fn into_request(self, source: SourceId) -> VerificationRequest {
        VerificationRequest {
            claim: self.claim().trim().to_string(),
            id: self.id.trim().to_string(),
            source,
            character: self.character.trim().to_string(),
            caption: self.caption.trim().to_string(),
        }
    }
}

pub fn read_rows(path: &Path) -> Result<Vec<InputRow>> {
    let file = std::fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    read_rows_from(file).with_context(|| format!("Failed to read rows from {}", path.display()))
}

pub fn read_rows_from<R: Read>(reader: R) -> Result<Vec<InputRow>> {
    let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(reader);
    let mut rows = Vec::new();
    for row in csv.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

pub fn write_predictions(path: &Path, records: &[PredictionRecord]) -> Result<()> {
    let file = std::fs::File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    write_predictions_to(file, records)
}

pub fn write_predictions_to<W: Write>(writer: W, records: &[PredictionRecord]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    if records.is_empty() {
        csv.write_record(OUTPUT_HEADERS)?;
    }
    for record in records {
        csv.serialize(record)?;
    }
    csv.flush()?;
    Ok(())
}
