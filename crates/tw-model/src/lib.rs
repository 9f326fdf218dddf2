// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
//!
//! Stable contract types shared by every taskwire crate: service addresses,
//! parameter and endpoint definitions, the job model, the unified server
//! response shape, and the error catalog.
//!
//! Nothing in this crate talks to the network or the filesystem; it is the
//! normalized representation everything else parses into or renders from.
//! If you only take one dependency, take this one.

/// Service addresses and the resolver that classifies raw URLs into them.
pub mod address;
/// The shared error catalog for taskwire.
pub mod error;
/// Per-job task plan, stage outputs, progress, and terminal state.
pub mod job;
/// Parameter, endpoint, and service definitions.
pub mod parameter;
/// The unified server response shape and its protocol extensions.
pub mod response;

pub use address::{resolve_address, AddressHint, ServiceAddress};
pub use error::{Error, ErrorSnapshot, Result};
pub use job::{Job, JobState, Stage, StageProgress};
pub use parameter::{
    canonical_json_sha1, dedup_definitions, normalize_name, EndpointDefinition, EndpointParameter,
    HttpMethod, ParameterDefinition, ParameterFormat, ParameterLocation, ParameterType, ServiceDefinition,
    Specification,
};
pub use response::{
    BaseJobResponse, Protocol, ProtocolExtension, ReplicateExtension, RunpodExtension, SocaityExtension,
    UnifiedStatus,
};
