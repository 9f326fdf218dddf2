// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fetches or reads a spec document from an inline object, a file path, or
//! a URL, including the fallback-path probing and Runpod spec-proxy
//! special case.

use serde_json::Value;
use tw_model::{Error, Result};

/// The ordered fallback suffixes tried when a URL does not itself end in
/// `openapi.json`.
pub const FALLBACK_PATHS: &[&str] =
    &["/openapi.json", "/api/openapi.json", "/docs/openapi.json", "/redoc/openapi.json"];

/// Default timeout, in seconds, for a spec-loader HTTP GET.
pub const DEFAULT_SPEC_FETCH_TIMEOUT_SECS: u64 = 30;

/// One of the three inputs the spec loader accepts.
pub enum SpecSource<'a> {
    /// An already-parsed spec object.
    Inline(Value),
    /// A local file path.
    File(&'a std::path::Path),
    /// A remote URL.
    Url(&'a str),
}

/// Capability that fetches a Runpod serverless endpoint's spec by
/// submitting a job (`{"path": "/openapi.json"}`) and awaiting its result,
/// since Runpod serverless hosts do not expose the spec statically.
///
/// Implemented by the orchestrator, which has the job-submission machinery;
/// kept as a trait here so the loader has no dependency on it.
#[async_trait::async_trait]
pub trait RunpodSpecProxy: Send + Sync {
    /// Submits `{"path": "/openapi.json"}` to `pod_url` and returns the
    /// decoded spec once the job finishes.
    async fn fetch_spec(&self, pod_url: &str) -> Result<Value>;
}

/// Loads a spec document from one of [`SpecSource`]'s variants.
///
/// `proxy` is consulted only when `source` is a URL recognized as a Runpod
/// serverless host; pass `None` when Runpod spec fetching isn't needed.
pub async fn load_spec(
    source: SpecSource<'_>,
    client: &reqwest::Client,
    proxy: Option<&dyn RunpodSpecProxy>,
) -> Result<Value> {
    match source {
        SpecSource::Inline(value) => Ok(value),
        SpecSource::File(path) => load_from_file(path),
        SpecSource::Url(url) => load_from_url(url, client, proxy).await,
    }
}

fn load_from_file(path: &std::path::Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .map_err(|_| Error::SpecNotFound(path.display().to_string()))?;
    serde_json::from_str(&content).map_err(|e| Error::SpecMalformed(e.to_string()))
}

fn is_runpod_url(url: &str) -> bool {
    url.contains("api.runpod.ai")
}

async fn load_from_url(
    url: &str,
    client: &reqwest::Client,
    proxy: Option<&dyn RunpodSpecProxy>,
) -> Result<Value> {
    if is_runpod_url(url) {
        if let Some(proxy) = proxy {
            return proxy.fetch_spec(url).await;
        }
        return Err(Error::SpecNotFound(format!(
            "{url} is a Runpod serverless host; no RunpodSpecProxy configured"
        )));
    }

    if url.ends_with("openapi.json") {
        return fetch_json(client, url).await;
    }

    if let Ok(value) = fetch_json(client, url).await {
        return Ok(value);
    }

    let base = url.trim_end_matches('/');
    for suffix in FALLBACK_PATHS {
        if let Ok(value) = fetch_json(client, &format!("{base}{suffix}")).await {
            return Ok(value);
        }
    }

    Err(Error::SpecNotFound(url.to_string()))
}

async fn fetch_json(client: &reqwest::Client, url: &str) -> Result<Value> {
    let response = client
        .get(url)
        .timeout(std::time::Duration::from_secs(DEFAULT_SPEC_FETCH_TIMEOUT_SECS))
        .send()
        .await
        .map_err(|e| Error::RequestFailed(e.to_string()))?;

    if !response.status().is_success() {
        return Err(Error::HttpError {
            status: response.status().as_u16(),
            body_snippet: String::new(),
        });
    }

    response.json::<Value>().await.map_err(|e| Error::SpecMalformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn inline_source_returns_as_is() {
        let client = reqwest::Client::new();
        let spec = json!({"openapi": "3.1.0"});
        let loaded = load_spec(SpecSource::Inline(spec.clone()), &client, None).await.unwrap();
        assert_eq!(loaded, spec);
    }

    #[tokio::test]
    async fn missing_file_is_spec_not_found() {
        let client = reqwest::Client::new();
        let path = std::path::Path::new("/nonexistent/spec.json");
        let err = load_spec(SpecSource::File(path), &client, None).await.unwrap_err();
        assert_eq!(err.kind(), "spec_not_found");
    }

    #[tokio::test]
    async fn fallback_paths_exhaust_before_not_found() {
        let server = wiremock::MockServer::start().await;
        // No mocks registered: every probe 404s.
        let client = reqwest::Client::new();
        let err = load_spec(SpecSource::Url(&server.uri()), &client, None).await.unwrap_err();
        assert_eq!(err.kind(), "spec_not_found");
    }

    #[tokio::test]
    async fn direct_openapi_json_url_is_fetched_first() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/openapi.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/openapi.json", server.uri());
        let loaded = load_spec(SpecSource::Url(&url), &client, None).await.unwrap();
        assert_eq!(loaded, json!({"ok": true}));
    }

    #[tokio::test]
    async fn runpod_url_without_proxy_fails() {
        let client = reqwest::Client::new();
        let err = load_spec(SpecSource::Url("https://api.runpod.ai/v2/abc"), &client, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "spec_not_found");
    }
}
