// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Spec loading and dialect parsing: fetches a service's OpenAPI/FastTaskAPI/
//! Cog/provider document and reduces it to the normalized service model.
//!
//! The pipeline is detect-then-parse: [`detect::detect_specification`]
//! classifies the loaded document, and [`parsers::parse_service`] dispatches
//! to the matching parser to produce a `tw_model::ServiceDefinition`.

/// Specification classification.
pub mod detect;
/// Fetching a spec document from an inline value, file, or URL.
pub mod loader;
/// Dialect-specific parsers and the top-level dispatcher.
pub mod parsers;
/// Shared OpenAPI schema-node reduction.
pub mod schema;

pub use detect::detect_specification;
pub use loader::{load_spec, RunpodSpecProxy, SpecSource, DEFAULT_SPEC_FETCH_TIMEOUT_SECS, FALLBACK_PATHS};
pub use parsers::parse_service;
