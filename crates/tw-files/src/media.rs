// SPDX-License-Identifier: MIT OR Apache-2.0
//! The normalized media value the file handler's stages operate on, and the
//! external upload capability it delegates to.

use std::path::PathBuf;

use tw_model::Result;

/// What a caller supplied for a file-typed parameter, before the Load stage
/// has materialized it.
#[derive(Debug, Clone)]
pub enum FileInput {
    /// A local filesystem path.
    Path(PathBuf),
    /// Raw bytes supplied directly, with a caller-chosen name.
    Bytes {
        /// Field/file name to use on the wire.
        name: String,
        /// Content type, guessed from `name` when absent.
        content_type: Option<String>,
        /// The file's raw content.
        bytes: Vec<u8>,
    },
    /// Already a URL; never re-uploaded or re-read.
    Url(String),
}

/// A named, in-memory (or URL-backed) file, the File Handler's normalized
/// unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaFile {
    /// File name, used for multipart field naming and extension-based
    /// content-type fallback.
    pub name: String,
    /// MIME content type.
    pub content_type: String,
    /// The file's content.
    pub content: MediaContent,
}

/// Where a [`MediaFile`]'s bytes currently live.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaContent {
    /// In-memory bytes, not yet uploaded.
    Bytes(Vec<u8>),
    /// A URL the content can already be fetched from.
    Url(String),
}

impl MediaFile {
    /// Byte size of in-memory content; `0` for URL-backed files (their size
    /// is irrelevant to the upload-threshold computation since a URL input
    /// is never uploaded).
    #[must_use]
    pub fn byte_len(&self) -> usize {
        match &self.content {
            MediaContent::Bytes(b) => b.len(),
            MediaContent::Url(_) => 0,
        }
    }

    /// Whether this file still carries bytes (has not been replaced by an
    /// uploaded URL).
    #[must_use]
    pub fn is_inline(&self) -> bool {
        matches!(self.content, MediaContent::Bytes(_))
    }
}

/// Guesses a MIME type from a file name's extension, defaulting to the
/// generic octet-stream type when unrecognized.
#[must_use]
pub fn guess_content_type(name: &str) -> String {
    mime_guess::from_path(name).first_or_octet_stream().essence_str().to_string()
}

/// External capability that accepts a batch of media files and returns
/// accessible URLs, one per input file, in the same order.
#[async_trait::async_trait]
pub trait Uploader: Send + Sync {
    /// Uploads `files` and returns one URL per file, order-preserving.
    async fn upload(&self, files: &[MediaFile]) -> Result<Vec<String>>;
}
