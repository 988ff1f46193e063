//! Accuracy of a results file against labelled rows.

use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::Path;

use anyhow::{anyhow, Context, Result};

const RESULT_ID_COLUMNS: [&str; 3] = ["Story ID", "StoryID", "id"];
const LABEL_ID_COLUMNS: [&str; 3] = ["id", "ID", "Id"];
const PREDICTION_COLUMNS: [&str; 3] = ["Prediction", "prediction", "pred"];
const LABEL_COLUMN: &str = "label";
const MAX_MISMATCHES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub id: String,
    pub predicted: u8,
    pub label: String,
    pub rationale: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvalReport {
    pub matched: usize,
    /// Joined rows dropped for an unreadable prediction or unknown label.
    pub dropped: usize,
    pub correct: usize,
    pub true_positives: usize,
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    /// First mismatches in results order.
    pub mismatches: Vec<Mismatch>,
}

impl EvalReport {
    pub fn accuracy(&self) -> f64 {
        if self.matched == 0 { 0.0 } else { self.correct as f64 / self.matched as f64 }
    }
}

impl fmt::Display for EvalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Evaluation summary")?;
        writeln!(f, "---")?;
        writeln!(f, "Matched examples: {}", self.matched)?;
        if self.dropped > 0 {
            writeln!(f, "Dropped rows (bad prediction or label): {}", self.dropped)?;
        }
        writeln!(f, "Correct predictions: {}", self.correct)?;
        writeln!(f, "Accuracy: {:.4} ({:.2}%)", self.accuracy(), self.accuracy() * 100.0)?;
        writeln!(f, "---")?;
        writeln!(f, "True Positives (pred=1,label=1): {}", self.true_positives)?;
        writeln!(f, "True Negatives (pred=0,label=0): {}", self.true_negatives)?;
        writeln!(f, "False Positives (pred=1,label=0): {}", self.false_positives)?;
        writeln!(f, "False Negatives (pred=0,label=1): {}", self.false_negatives)?;
        if !self.mismatches.is_empty() {
            writeln!(f, "---")?;
            writeln!(f, "Sample mismatches (up to {MAX_MISMATCHES}):")?;
            for m in &self.mismatches {
                writeln!(f, "{}\tpred={}\tlabel={}\t{}", m.id, m.predicted, m.label, m.rationale)?;
            }
        }
        Ok(())
    }
}

pub fn evaluate(results: &Path, labels: &Path) -> Result<EvalReport> {
    let open = |p: &Path| std::fs::File::open(p).with_context(|| format!("Failed to open {}", p.display()));
    evaluate_readers(open(results)?, open(labels)?)
}

pub fn evaluate_readers<R: Read, L: Read>(results: R, labels: L) -> Result<EvalReport> {
    let labels = read_labels(labels)?;

    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(results);
    let headers = reader.headers()?.clone();
    let id_col = find_column(&headers, &RESULT_ID_COLUMNS).ok_or_else(|| missing("results", "ID", &headers))?;
    let pred_col = find_column(&headers, &PREDICTION_COLUMNS).ok_or_else(|| missing("results", "Prediction", &headers))?;
    let rationale_col = find_column(&headers, &["Rationale"]);

    let mut report = EvalReport::default();
    for record in reader.records() {
        let record = record?;
        let id = normalize_id(record.get(id_col).unwrap_or_default());
        let Some(label) = labels.get(&id) else { continue };

        let predicted = record.get(pred_col).and_then(parse_prediction);
        let (Some(predicted), Some(expected)) = (predicted, label_value(label)) else {
            report.dropped += 1;
            continue;
        };
        report.matched += 1;
        match (predicted, expected) {
            (1, 1) => report.true_positives += 1,
            (0, 0) => report.true_negatives += 1,
            (1, 0) => report.false_positives += 1,
            _ => report.false_negatives += 1,
        }
        if predicted == expected {
            report.correct += 1;
        } else if report.mismatches.len() < MAX_MISMATCHES {
            report.mismatches.push(Mismatch {
                id,
                predicted,
                label: label.clone(),
                rationale: rationale_col.and_then(|c| record.get(c)).unwrap_or_default().to_string(),
            });
        }
    }
    Ok(report)
}

fn read_labels<L: Read>(labels: L) -> Result<HashMap<String, String>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(labels);
    let headers = reader.headers()?.clone();
    let id_col = find_column(&headers, &LABEL_ID_COLUMNS).ok_or_else(|| missing("labels", "ID", &headers))?;
    let label_col = find_column(&headers, &[LABEL_COLUMN]).ok_or_else(|| missing("labels", "label", &headers))?;

    let mut out = HashMap::new();
    for record in reader.records() {
        let record = record?;
        let id = normalize_id(record.get(id_col).unwrap_or_default());
        out.insert(id, record.get(label_col).unwrap_or_default().to_string());
    }
    Ok(out)
}

fn find_column(headers: &csv::StringRecord, candidates: &[&str]) -> Option<usize> {
    candidates.iter().find_map(|c| headers.iter().position(|h| h == *c))
}

fn missing(file: &str, what: &str, headers: &csv::StringRecord) -> anyhow::Error {
    anyhow!("No {what} column found in {file}; columns: {:?}", headers.iter().collect::<Vec<_>>())
}

/// `"7"`, `" 7 "` and `"7.0"` name the same row.
fn normalize_id(raw: &str) -> String {
    let raw = raw.trim();
    match raw.parse::<f64>() {
        Ok(n) if n.fract() == 0.0 && n.is_finite() => format!("{}", n as i64),
        _ => raw.to_string(),
    }
}

fn parse_prediction(raw: &str) -> Option<u8> {
    match raw.trim().parse::<f64>().ok()? {
        n if n == 0.0 => Some(0),
        n if n == 1.0 => Some(1),
        _ => None,
    }
}

fn label_value(label: &str) -> Option<u8> {
    match label.trim().to_lowercase().as_str() {
        "consistent" => Some(1),
        "contradict" => Some(0),
        _ => None,
    }
}
