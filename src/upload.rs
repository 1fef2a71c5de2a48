//! Persists decoded uploads into the engine's documents directory.
//!
//! The engine indexes every `.txt` file it finds there on `process`, so this
//! is the only hand-off between uploads and the console session.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::{BridgeError, Result};
use crate::models::UploadedFile;
use crate::multipart;

/// A file written to the documents directory.
#[derive(Debug, Clone, Serialize)]
pub struct SavedFile {
    pub filename: String,
    pub size: usize,
    pub path: PathBuf,
}

/// Decode a multipart body and write every file part to `documents_dir`.
///
/// Fails with [`BridgeError::MalformedUpload`] when the content type has no
/// boundary or the body holds no usable file part.
pub async fn store_multipart(
    documents_dir: &Path,
    content_type: &str,
    body: &[u8],
) -> Result<Vec<SavedFile>> {
    let boundary = multipart::boundary_from_content_type(content_type)?;
    let files = multipart::decode(body, &boundary);
    if files.is_empty() {
        return Err(BridgeError::MalformedUpload("no files in upload".into()));
    }
    save_files(documents_dir, files).await
}

/// Write `files` into `documents_dir`, creating it if needed. Existing files
/// with the same name are replaced.
///
/// Every filename is checked before anything is written, so a bad name
/// rejects the whole upload. Parts sharing a basename collapse into one
/// file holding the last part's content.
pub async fn save_files(documents_dir: &Path, files: Vec<UploadedFile>) -> Result<Vec<SavedFile>> {
    let mut named: Vec<(String, Vec<u8>)> = Vec::with_capacity(files.len());
    for file in files {
        let name = safe_filename(&file.filename).ok_or_else(|| {
            BridgeError::MalformedUpload(format!("unusable filename: {:?}", file.filename))
        })?;
        match named.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => {
                tracing::debug!(file = %name, "duplicate upload name, keeping last part");
                slot.1 = file.bytes;
            }
            None => named.push((name, file.bytes)),
        }
    }

    tokio::fs::create_dir_all(documents_dir).await?;

    let mut saved = Vec::with_capacity(named.len());
    for (name, bytes) in named {
        let path = documents_dir.join(&name);
        tokio::fs::write(&path, &bytes).await?;
        tracing::info!(file = %name, bytes = bytes.len(), "saved upload");
        saved.push(SavedFile {
            filename: name,
            size: bytes.len(),
            path,
        });
    }
    Ok(saved)
}

/// Last path component of a client-supplied name, accepting both `/` and
/// `\` separators. `None` for names that would escape the directory.
pub fn safe_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next()?.trim();
    if base.is_empty() || base == "." || base == ".." || base.contains('\0') {
        return None;
    }
    Some(base.to_string())
}
