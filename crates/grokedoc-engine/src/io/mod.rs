use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::editing::{BufferContent, DocumentTree, InvariantViolation};

pub mod export;

/// Persisted document: buffer content and tree side by side.
///
/// ```json
/// { "baseText": "...", "chunks": [{ "type": "insert", ... }], "documentTree": { ... } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedDocument {
    #[serde(flatten)]
    pub content: BufferContent,
    pub document_tree: DocumentTree,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Malformed document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Inconsistent document: {0}")]
    Invariant(#[from] InvariantViolation),
}

#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not load {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: LoadError,
    },
    #[error("Could not encode document: {0}")]
    Encode(#[from] serde_json::Error),
}

impl SavedDocument {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse and check that the tree is well formed and fits inside the replayed text.
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        let document: SavedDocument = serde_json::from_str(json)?;
        let len = document.content.replay().chars().count();
        if let Err(violation) = document.document_tree.validate_within(len) {
            log::warn!("rejected saved document: {violation}");
            return Err(violation.into());
        }
        Ok(document)
    }
}

/// Read and validate a saved document
pub fn read_document(path: &Path) -> Result<SavedDocument, IoError> {
    if !path.exists() {
        return Err(IoError::NotFound(path.to_path_buf()));
    }
    let json = fs::read_to_string(path)?;
    SavedDocument::from_json(&json).map_err(|source| IoError::Load {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a saved document, creating parent directories as needed
pub fn write_document(path: &Path, document: &SavedDocument) -> Result<(), IoError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, document.to_json()?)?;
    Ok(())
}
