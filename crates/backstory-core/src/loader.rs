//! Loads `.txt` reference documents from a directory tree.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::Result;
use crate::types::Document;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

#[derive(Debug, Clone)]
pub struct DocumentLoader {
    root: PathBuf,
}

impl DocumentLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Reads every `.txt` file under the root, sorted by path.
    ///
    /// Files that cannot be read are logged and skipped.
    pub fn load(&self) -> Result<Vec<Document>> {
        let files = self.list_txt_files();
        info!(root = %self.root.display(), files = files.len(), "scanning for documents");
        let mut documents = Vec::with_capacity(files.len());
        for path in files {
            match fs::read(&path) {
                Ok(bytes) => {
                    let text = normalize_newlines(&decode_text(&bytes));
                    let source = file_name(&path);
                    info!(source = %source, chars = text.chars().count(), "loaded document");
                    documents.push(Document::new(text, source));
                }
                Err(e) => warn!(path = %path.display(), error = %e, "failed to read document"),
            }
        }
        Ok(documents)
    }

    fn list_txt_files(&self) -> Vec<PathBuf> {
        let mut txt_files = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("txt") {
                txt_files.push(path.to_path_buf());
            }
        }
        txt_files.sort();
        txt_files
    }
}

/// Decodes bytes as UTF-8 (with or without BOM), falling back to Latin-1.
pub fn decode_text(bytes: &[u8]) -> String {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(body) {
        Ok(s) => s.to_string(),
        Err(_) => body.iter().map(|&b| char::from(b)).collect(),
    }
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| path.to_string_lossy().to_string())
}
