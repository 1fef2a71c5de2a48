//! Minimal `multipart/form-data` decoder for document uploads.
//!
//! Only file parts are kept. Content is treated as opaque bytes; there is
//! no charset handling. Anything malformed is skipped rather than reported,
//! so callers decide whether an empty result is an error.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{BridgeError, Result};
use crate::models::UploadedFile;

static FILENAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?i)filename="([^"]*)""#).unwrap());

const HEADER_END: &[u8] = b"\r\n\r\n";
const CRLF: &[u8] = b"\r\n";

/// Split `body` on `--{boundary}` and collect every part that names a file
/// and carries at least one byte of content.
pub fn decode(body: &[u8], boundary: &str) -> Vec<UploadedFile> {
    if boundary.is_empty() {
        return Vec::new();
    }
    let delimiter = format!("--{}", boundary);

    // Skip the preamble before the first delimiter; stop at the closing `--`
    split_on(body, delimiter.as_bytes())
        .into_iter()
        .skip(1)
        .take_while(|part| !part.starts_with(b"--"))
        .filter_map(decode_part)
        .collect()
}

fn decode_part(part: &[u8]) -> Option<UploadedFile> {
    let header_end = find(part, HEADER_END)?;
    let headers = String::from_utf8_lossy(&part[..header_end]);

    let disposition = headers
        .split("\r\n")
        .find(|h| h.to_ascii_lowercase().starts_with("content-disposition:"))?;
    let filename = FILENAME_RE.captures(disposition)?[1].to_string();
    if filename.is_empty() {
        return None;
    }

    let mut content = &part[header_end + HEADER_END.len()..];
    if content.ends_with(CRLF) {
        content = &content[..content.len() - CRLF.len()];
    }
    if content.is_empty() {
        return None;
    }

    Some(UploadedFile {
        filename,
        bytes: content.to_vec(),
    })
}

/// Boundary parameter of a `multipart/form-data` content type.
pub fn boundary_from_content_type(content_type: &str) -> Result<String> {
    let lower = content_type.to_ascii_lowercase();
    let at = lower
        .find("boundary=")
        .ok_or_else(|| BridgeError::MalformedUpload("no boundary in content-type".into()))?;

    let value = content_type[at + "boundary=".len()..]
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .trim_matches('"');

    if value.is_empty() {
        return Err(BridgeError::MalformedUpload("empty boundary".into()));
    }
    Ok(value.to_string())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn split_on<'a>(mut haystack: &'a [u8], delimiter: &[u8]) -> Vec<&'a [u8]> {
    let mut parts = Vec::new();
    while let Some(at) = find(haystack, delimiter) {
        parts.push(&haystack[..at]);
        haystack = &haystack[at + delimiter.len()..];
    }
    parts.push(haystack);
    parts
}
