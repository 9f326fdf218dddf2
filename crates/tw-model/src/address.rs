// SPDX-License-Identifier: MIT OR Apache-2.0

//! Service addresses: a tagged variant over the URL shapes the four
//! supported providers expose, plus the resolver that classifies a raw
//! string or map into one.

use serde::{Deserialize, Serialize};

/// A hint the caller can supply to short-circuit address classification
/// when the raw URL alone is ambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressHint {
    /// Force Runpod classification.
    Runpod,
    /// Force Replicate classification.
    Replicate,
    /// Force Socaity classification.
    Socaity,
    /// Force generic classification.
    Generic,
}

/// A resolved, normalized service address.
///
/// `url` is always non-empty, scheme-prefixed, and trailing-slash-stripped
/// on every variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ServiceAddress {
    /// A plain OpenAPI-style host with no provider-specific conventions.
    Generic {
        /// The normalized base URL.
        url: String,
    },
    /// A host on the `socaity.ai` family.
    Socaity {
        /// The normalized base URL.
        url: String,
    },
    /// A Runpod serverless endpoint, identified by pod id.
    Runpod {
        /// The normalized base URL (`https://api.runpod.ai/v2/{pod_id}`).
        url: String,
        /// The pod id extracted from the input.
        pod_id: String,
        /// Any trailing route preserved from the input (e.g. `/run`).
        path: Option<String>,
    },
    /// A Replicate-hosted model.
    Replicate {
        /// The normalized base URL.
        url: String,
        /// `user/model` when parseable from the input.
        model_name: Option<String>,
        /// A pinned version hash, when present.
        version: Option<String>,
    },
}

impl ServiceAddress {
    /// The normalized base URL common to every variant.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Generic { url }
            | Self::Socaity { url }
            | Self::Runpod { url, .. }
            | Self::Replicate { url, .. } => url,
        }
    }

    /// Short name of the variant, used for specification-detection fallback
    /// and diagnostics.
    #[must_use]
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Generic { .. } => "generic",
            Self::Socaity { .. } => "socaity",
            Self::Runpod { .. } => "runpod",
            Self::Replicate { .. } => "replicate",
        }
    }
}

fn normalize_base(raw: &str) -> String {
    let trimmed = raw.trim();
    let scheme_prefixed = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    scheme_prefixed
        .strip_suffix('/')
        .map(str::to_string)
        .unwrap_or(scheme_prefixed)
}

/// Strips a single `/run` suffix, never repeatedly, per the resolved
/// ambiguity between `strip_suffix` and `trim_end_matches` semantics.
fn strip_run_suffix(s: &str) -> &str {
    s.strip_suffix("/run").unwrap_or(s)
}

/// Classifies and normalizes a raw URL or shorthand identifier into a
/// [`ServiceAddress`].
///
/// `(raw, hint) → ServiceAddress`, per the address resolver contract.
#[must_use]
pub fn resolve_address(raw: &str, hint: Option<AddressHint>) -> ServiceAddress {
    let normalized = normalize_base(raw);

    if matches!(hint, Some(AddressHint::Runpod)) || normalized.contains("api.runpod.ai") || looks_like_pod_id(raw)
    {
        return resolve_runpod(raw, &normalized);
    }
    if matches!(hint, Some(AddressHint::Replicate)) || normalized.contains("api.replicate.com") {
        return resolve_replicate(raw, &normalized);
    }
    if normalized.contains("socaity.ai") {
        return ServiceAddress::Socaity { url: normalized };
    }
    ServiceAddress::Generic { url: normalized }
}

fn looks_like_pod_id(raw: &str) -> bool {
    let candidate = raw.trim().trim_end_matches("/run");
    !candidate.is_empty()
        && !candidate.contains("://")
        && !candidate.contains('.')
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn resolve_runpod(raw: &str, normalized: &str) -> ServiceAddress {
    if normalized.contains("api.runpod.ai") {
        // https://api.runpod.ai/v2/{pod_id}/{...path}
        let after_v2 = normalized.split("/v2/").nth(1).unwrap_or_default();
        let mut parts = after_v2.splitn(2, '/');
        let pod_id = parts.next().unwrap_or_default().to_string();
        let path = parts.next().filter(|s| !s.is_empty()).map(|p| format!("/{p}"));
        return ServiceAddress::Runpod {
            url: format!("https://api.runpod.ai/v2/{pod_id}"),
            pod_id,
            path,
        };
    }

    // Plain shorthand: `pod_id`, `pod_id/run`, or localhost variants.
    let stripped = strip_run_suffix(raw.trim());
    let (pod_id, path) = if stripped.contains("localhost") || stripped.contains("127.0.0.1") {
        (stripped.to_string(), None)
    } else {
        (stripped.to_string(), None)
    };
    ServiceAddress::Runpod {
        url: format!("https://api.runpod.ai/v2/{pod_id}"),
        pod_id,
        path,
    }
}

fn resolve_replicate(raw: &str, normalized: &str) -> ServiceAddress {
    let trimmed = raw.trim();

    if normalized.contains("api.replicate.com") {
        return ServiceAddress::Replicate {
            url: normalized.to_string(),
            model_name: None,
            version: None,
        };
    }

    // bare version hash: 40+ hex chars
    if trimmed.len() >= 40 && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        return ServiceAddress::Replicate {
            url: "https://api.replicate.com/v1/predictions".to_string(),
            model_name: None,
            version: Some(trimmed.to_string()),
        };
    }

    // `user/model[:version]`
    if let Some((model, version)) = trimmed.split_once(':') {
        return ServiceAddress::Replicate {
            url: format!("https://api.replicate.com/v1/models/{model}/predictions"),
            model_name: Some(model.to_string()),
            version: Some(version.to_string()),
        };
    }
    if trimmed.matches('/').count() == 1 && !trimmed.contains("://") {
        return ServiceAddress::Replicate {
            url: format!("https://api.replicate.com/v1/models/{trimmed}/predictions"),
            model_name: Some(trimmed.to_string()),
            version: None,
        };
    }

    ServiceAddress::Replicate {
        url: normalized.to_string(),
        model_name: None,
        version: None,
    }
}
