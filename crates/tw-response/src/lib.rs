// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! The Response Parser: reduces whatever shape a provider's HTTP body
//! happens to be into a [`tw_model::BaseJobResponse`].
//!
//! Three strategies are tried in a fixed priority order ([`strategies`]);
//! the winning shape is then recursively unwrapped for nested job bodies
//! ([`nested`]) and, when the result carries file-shaped values, reduced to
//! concrete media ([`media`]) using the status tables in [`status`].

/// Media-result decoding: `{file_name, content_type, content}` shapes (or
/// bare URLs) reduced to concrete files, with lazy Replicate delivery
/// fetches.
pub mod media;
/// Nested-response recovery: unwraps a JSON-encoded inner job body and
/// merges it over the outer one.
pub mod nested;
/// Per-provider status vocabularies and tolerant progress extraction.
pub mod status;
/// The first-match-wins strategy dispatcher.
pub mod strategies;

pub use media::{decode_result_media, fetch_replicate_delivery, is_replicate_delivery_url};
pub use nested::decode_with_nested_recovery;
pub use status::{extract_progress, replicate_status, runpod_status};
pub use strategies::{decode_response, Strategy};
