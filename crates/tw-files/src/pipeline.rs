// SPDX-License-Identifier: MIT OR Apache-2.0
//! The three File Handler stages: Load, Decide-Upload, Attach.

use std::collections::BTreeMap;

use tw_config::{AttachFormat, UploadProfile};
use tw_model::{Error, Result};

use crate::media::{guess_content_type, FileInput, MediaContent, MediaFile, Uploader};

const BYTES_PER_MB: f64 = 1_048_576.0;

/// A file-typed parameter's value after the Load stage: either already a
/// URL (passed through untouched for the rest of the pipeline) or
/// materialized in-memory content.
#[derive(Debug, Clone, PartialEq)]
pub enum FileEntry {
    /// A URL input; never uploaded or re-encoded.
    Url(String),
    /// In-memory (or, after Decide-Upload, uploaded) content.
    File(MediaFile),
}

/// Stage 1 — Load: materializes every non-URL [`FileInput`] into a
/// [`MediaFile`]; URL inputs pass through unchanged.
pub async fn load_files(inputs: Vec<(String, FileInput)>) -> Result<BTreeMap<String, FileEntry>> {
    let mut out = BTreeMap::new();
    for (name, input) in inputs {
        let entry = match input {
            FileInput::Url(url) => FileEntry::Url(url),
            FileInput::Bytes { name: file_name, content_type, bytes } => {
                let content_type = content_type.unwrap_or_else(|| guess_content_type(&file_name));
                FileEntry::File(MediaFile { name: file_name, content_type, content: MediaContent::Bytes(bytes) })
            }
            FileInput::Path(path) => {
                let bytes = tokio::fs::read(&path)
                    .await
                    .map_err(|e| Error::FileNotReadable(format!("{}: {e}", path.display())))?;
                let file_name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("file")
                    .to_string();
                let content_type = guess_content_type(&file_name);
                FileEntry::File(MediaFile { name: file_name, content_type, content: MediaContent::Bytes(bytes) })
            }
        };
        out.insert(name, entry);
    }
    Ok(out)
}

/// Stage 2 — Decide-Upload: computes the total byte size of non-URL
/// entries and either rejects the batch (`FileTooLarge`), leaves it for
/// inline attachment, or uploads it and replaces each entry's content with
/// the returned URL.
///
/// The threshold comparison is strict-less-than: a total exactly equal to
/// `upload_threshold_mb` skips upload.
pub async fn decide_upload(
    mut entries: BTreeMap<String, FileEntry>,
    profile: &UploadProfile,
    uploader: Option<&dyn Uploader>,
) -> Result<BTreeMap<String, FileEntry>> {
    let total_bytes: usize = entries
        .values()
        .map(|e| match e {
            FileEntry::File(f) => f.byte_len(),
            FileEntry::Url(_) => 0,
        })
        .sum();
    let total_mb = total_bytes as f64 / BYTES_PER_MB;

    if let Some(max_mb) = profile.max_upload_mb {
        if total_mb > max_mb {
            return Err(Error::FileTooLarge { actual_mb: total_mb, max_mb });
        }
    }

    let Some(uploader) = uploader else { return Ok(entries) };
    let Some(threshold_mb) = profile.upload_threshold_mb else { return Ok(entries) };
    if total_mb <= threshold_mb {
        return Ok(entries);
    }

    let names: Vec<String> =
        entries.iter().filter(|(_, e)| matches!(e, FileEntry::File(_))).map(|(k, _)| k.clone()).collect();
    if names.is_empty() {
        return Ok(entries);
    }

    let files: Vec<MediaFile> = names
        .iter()
        .map(|name| match &entries[name] {
            FileEntry::File(f) => f.clone(),
            FileEntry::Url(_) => unreachable!("filtered to File entries above"),
        })
        .collect();

    let urls = uploader.upload(&files).await.map_err(|e| Error::UploadFailed(e.to_string()))?;
    if urls.len() != names.len() {
        return Err(Error::UploadFailed(format!(
            "uploader returned {} urls for {} files",
            urls.len(),
            names.len()
        )));
    }
    for (name, url) in names.into_iter().zip(urls) {
        entries.insert(name, FileEntry::Url(url));
    }
    Ok(entries)
}

/// A file still carrying bytes, framed for the wire per the profile's
/// [`AttachFormat`].
#[derive(Debug, Clone, PartialEq)]
pub enum AttachedFile {
    /// `(name, bytes, content-type)` suitable for a multipart form field.
    Multipart { name: String, content_type: String, bytes: Vec<u8> },
    /// A base64 string to inline into the JSON body.
    Base64(String),
}

/// The final, wire-ready shape of one file-typed parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum FileFragment {
    /// Ships as a plain string (a URL, whether original or uploaded).
    Url(String),
    /// Ships as bytes framed per the profile.
    Attached(AttachedFile),
}

/// Stage 3 — Attach: converts every entry still carrying bytes into the
/// format the provider's body framing expects. URL entries pass through.
#[must_use]
pub fn attach(entries: BTreeMap<String, FileEntry>, format: AttachFormat) -> BTreeMap<String, FileFragment> {
    entries
        .into_iter()
        .map(|(name, entry)| {
            let fragment = match entry {
                FileEntry::Url(url) => FileFragment::Url(url),
                FileEntry::File(file) => {
                    let bytes = match file.content {
                        MediaContent::Bytes(b) => b,
                        MediaContent::Url(url) => return (name, FileFragment::Url(url)),
                    };
                    let attached = match format {
                        AttachFormat::Multipart => {
                            AttachedFile::Multipart { name: file.name, content_type: file.content_type, bytes }
                        }
                        AttachFormat::Base64 => {
                            use base64::Engine;
                            AttachedFile::Base64(base64::engine::general_purpose::STANDARD.encode(bytes))
                        }
                    };
                    FileFragment::Attached(attached)
                }
            };
            (name, fragment)
        })
        .collect()
}
