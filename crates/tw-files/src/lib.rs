// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! The File Handler: a size-thresholded upload strategy that normalizes
//! mixed file inputs (local paths, URLs, byte blobs) into a single wire-ready
//! batch, choosing between inline encoding and out-of-band cloud upload.
//!
//! The three stages — [`pipeline::load_files`], [`pipeline::decide_upload`],
//! [`pipeline::attach`] — are exposed independently because the orchestrator
//! runs Load and Upload as separate pipeline stages while Attach happens
//! inline with request assembly.

/// File value types and the external upload capability.
pub mod media;
/// The Load / Decide-Upload / Attach stage functions.
pub mod pipeline;

pub use media::{guess_content_type, FileInput, MediaContent, MediaFile, Uploader};
pub use pipeline::{attach, decide_upload, load_files, AttachedFile, FileEntry, FileFragment};
