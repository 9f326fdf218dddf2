// SPDX-License-Identifier: MIT OR Apache-2.0
//! Provider dispatch: a tagged-variant Service Address determines URL
//! shape, body framing, file encoding, poll method, and auth rules. No
//! inheritance chain — every aspect is a match on [`Provider`].

use tw_config::AttachFormat;
use tw_model::{HttpMethod, ServiceAddress};

/// The four first-class request-layer dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Generic,
    Socaity,
    Runpod,
    Replicate,
}

impl Provider {
    /// Classifies the provider from an already-resolved address.
    #[must_use]
    pub fn from_address(address: &ServiceAddress) -> Self {
        match address {
            ServiceAddress::Generic { .. } => Self::Generic,
            ServiceAddress::Socaity { .. } => Self::Socaity,
            ServiceAddress::Runpod { .. } => Self::Runpod,
            ServiceAddress::Replicate { .. } => Self::Replicate,
        }
    }

    /// The provider name used for `{PROVIDER}_API_KEY` resolution and
    /// `tw_config::key_format_for` lookups; `None` for Generic, which has
    /// no format rule.
    #[must_use]
    pub fn key_provider_name(self) -> Option<&'static str> {
        match self {
            Self::Generic => None,
            Self::Socaity => Some("socaity"),
            Self::Runpod => Some("runpod"),
            Self::Replicate => Some("replicate"),
        }
    }

    /// Whether an API key is required to call this provider. Socaity only
    /// requires one when the host is actually `api.socaity.ai` (a
    /// self-hosted Socaity-protocol server may not).
    #[must_use]
    pub fn requires_api_key(self, address: &ServiceAddress) -> bool {
        match self {
            Self::Generic => false,
            Self::Socaity => address.url().contains("api.socaity.ai"),
            Self::Runpod | Self::Replicate => true,
        }
    }

    /// Query-location parameters are folded into the body bucket instead
    /// of the URL for every provider except Generic.
    #[must_use]
    pub fn folds_query_into_body(self) -> bool {
        !matches!(self, Self::Generic)
    }

    /// HTTP method used for the initial dispatch call.
    #[must_use]
    pub fn send_method(self) -> HttpMethod {
        HttpMethod::Post
    }

    /// HTTP method used for poll ticks.
    #[must_use]
    pub fn poll_method(self) -> HttpMethod {
        match self {
            Self::Generic | Self::Replicate => HttpMethod::Get,
            Self::Socaity | Self::Runpod => HttpMethod::Post,
        }
    }

    /// Whether this provider's body framing is multipart unconditionally,
    /// independent of whether any file parameters are present. Socaity's
    /// wire contract is always multipart; every other provider only goes
    /// multipart when a file parameter is actually attached.
    #[must_use]
    pub fn forces_multipart_body(self) -> bool {
        matches!(self, Self::Socaity)
    }

    /// Forces the file-attach format regardless of the configured profile:
    /// Runpod and Replicate have no multipart contract and require files
    /// to ship base64-inline or as already-uploaded URLs.
    #[must_use]
    pub fn forced_attach_format(self) -> Option<AttachFormat> {
        match self {
            Self::Runpod | Self::Replicate => Some(AttachFormat::Base64),
            Self::Generic | Self::Socaity => None,
        }
    }

    /// Builds the request URL for the initial dispatch call.
    ///
    /// Generic and Socaity use `{base}/{path}`, with query parameters
    /// appended for Generic only (Socaity folds them into the body).
    /// Runpod always dispatches to `{base}/run`. Replicate dispatches
    /// straight to its single endpoint URL.
    #[must_use]
    pub fn build_url(self, address: &ServiceAddress, endpoint_path: &str, query: &[(String, String)]) -> String {
        match self {
            Self::Generic => {
                let mut url = reqwest::Url::parse(&join_path(address.url(), endpoint_path))
                    .unwrap_or_else(|_| reqwest::Url::parse(address.url()).expect("normalized base url"));
                if !query.is_empty() {
                    let mut pairs = url.query_pairs_mut();
                    for (k, v) in query {
                        pairs.append_pair(k, v);
                    }
                }
                url.to_string()
            }
            Self::Socaity => join_path(address.url(), endpoint_path),
            Self::Runpod => format!("{}/run", address.url()),
            Self::Replicate => address.url().to_string(),
        }
    }

    /// Injects a `version` field into the body for Replicate when the URL
    /// contains `/predictions` and the address carries a pinned version.
    #[must_use]
    pub fn should_inject_version(self, address: &ServiceAddress, url: &str) -> Option<String> {
        if !matches!(self, Self::Replicate) || !url.contains("/predictions") {
            return None;
        }
        match address {
            ServiceAddress::Replicate { version: Some(v), .. } => Some(v.clone()),
            _ => None,
        }
    }
}

fn join_path(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tw_model::resolve_address;

    #[test]
    fn runpod_always_dispatches_to_run() {
        let addr = resolve_address("pod123", None);
        let provider = Provider::from_address(&addr);
        assert_eq!(provider, Provider::Runpod);
        assert_eq!(provider.build_url(&addr, "/generate", &[]), "https://api.runpod.ai/v2/pod123/run");
    }

    #[test]
    fn generic_appends_query_to_url() {
        let addr = resolve_address("https://example.com", None);
        let provider = Provider::from_address(&addr);
        let url = provider.build_url(&addr, "/tts", &[("voice".into(), "alice".into())]);
        assert!(url.starts_with("https://example.com/tts?"));
        assert!(url.contains("voice=alice"));
    }

    #[test]
    fn replicate_injects_version_only_on_predictions_path() {
        let addr = resolve_address("user/model:v1", None);
        let provider = Provider::from_address(&addr);
        let url = provider.build_url(&addr, "", &[]);
        assert_eq!(provider.should_inject_version(&addr, &url), Some("v1".to_string()));
    }

    #[test]
    fn runpod_and_replicate_force_base64() {
        assert_eq!(Provider::Runpod.forced_attach_format(), Some(AttachFormat::Base64));
        assert_eq!(Provider::Replicate.forced_attach_format(), Some(AttachFormat::Base64));
        assert_eq!(Provider::Generic.forced_attach_format(), None);
    }

    #[test]
    fn only_socaity_forces_multipart_body() {
        assert!(Provider::Socaity.forces_multipart_body());
        assert!(!Provider::Generic.forces_multipart_body());
        assert!(!Provider::Runpod.forces_multipart_body());
        assert!(!Provider::Replicate.forces_multipart_body());
    }
}
