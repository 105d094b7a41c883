//! Input resolution: a user-supplied path or in-memory bytes → a local PDF.
//!
//! pdfium and `pdftoppm` both need a file-system path. Bytes are written to a
//! [`NamedTempFile`] that lives as long as the [`ResolvedInput`], so cleanup
//! happens on drop even if the review fails part-way. The `%PDF` magic is
//! checked up front so callers get a meaningful error rather than a backend
//! failure.

use crate::error::ReviewError;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A validated PDF on disk.
#[derive(Debug)]
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input came as bytes; kept in a temp file until dropped.
    Temporary(NamedTempFile),
}

impl ResolvedInput {
    /// Get the path to the PDF file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Temporary(f) => f.path(),
        }
    }
}

/// Resolve a local file path, validating existence and PDF magic bytes.
pub fn resolve_path(path_str: &str) -> Result<ResolvedInput, ReviewError> {
    if path_str.trim().is_empty() {
        return Err(ReviewError::InvalidInput {
            input: path_str.to_string(),
        });
    }

    let path = PathBuf::from(path_str);
    if !path.exists() {
        return Err(ReviewError::FileNotFound { path });
    }
    if path.is_dir() {
        return Err(ReviewError::InvalidInput {
            input: path_str.to_string(),
        });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_err() || &magic != PDF_MAGIC {
                return Err(ReviewError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ReviewError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(ReviewError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Write `bytes` to a temp file after checking the PDF magic.
pub fn resolve_bytes(bytes: &[u8]) -> Result<ResolvedInput, ReviewError> {
    let mut tmp = NamedTempFile::new()
        .map_err(|e| ReviewError::Internal(format!("tempfile: {e}")))?;

    if !bytes.starts_with(PDF_MAGIC) {
        let mut magic = [0u8; 4];
        for (slot, b) in magic.iter_mut().zip(bytes) {
            *slot = *b;
        }
        return Err(ReviewError::NotAPdf {
            path: tmp.path().to_path_buf(),
            magic,
        });
    }

    tmp.write_all(bytes)
        .map_err(|e| ReviewError::Internal(format!("tempfile write: {e}")))?;
    tmp.flush()
        .map_err(|e| ReviewError::Internal(format!("tempfile flush: {e}")))?;

    debug!("Wrote {} PDF bytes to {}", bytes.len(), tmp.path().display());
    Ok(ResolvedInput::Temporary(tmp))
}
