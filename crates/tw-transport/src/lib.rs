// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! The Provider-Adapted Request Layer: a base client with a reusable HTTP
//! connection pool, dispatched by service address variant to one of four
//! provider dialects (Generic, Socaity, Runpod, Replicate).
//!
//! [`request::format_request`] assembles a [`request::RequestData`] from an
//! endpoint and caller input; [`client::Client`] sends it and polls for
//! completion.

/// The base client: connection pool, auth, send, and poll.
pub mod client;
/// Provider dispatch by service-address variant.
pub mod provider;
/// Request assembly into query/body/file/header buckets.
pub mod request;

pub use client::{Client, HttpResponse};
pub use provider::Provider;
pub use request::{format_request, FileSlot, RequestData};
