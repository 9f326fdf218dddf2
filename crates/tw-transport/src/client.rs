// SPDX-License-Identifier: MIT OR Apache-2.0
//! The base client: a reusable HTTP connection pool plus the per-provider
//! dispatch, send, and poll logic.

use std::time::Duration;

use serde_json::Value;
use tw_config::{key_format_for, validate_key_format, ClientConfig};
use tw_files::{AttachedFile, FileFragment};
use tw_model::{BaseJobResponse, Error, Result, ServiceAddress};

use crate::provider::Provider;
use crate::request::{FileSlot, RequestData};

/// A decoded HTTP response, ready for the Response Parser.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Value,
}

/// Owns a reusable `reqwest::Client`, the resolved provider, and the API
/// key (if any) for one service address.
#[derive(Debug)]
pub struct Client {
    http: reqwest::Client,
    config: ClientConfig,
    provider: Provider,
    address: ServiceAddress,
    api_key: Option<String>,
}

impl Client {
    /// Constructs a client for `address`, validating `api_key` against the
    /// provider's format rules (prefix, length) per §4.6.
    pub fn new(
        http: reqwest::Client,
        config: ClientConfig,
        address: ServiceAddress,
        api_key: Option<String>,
    ) -> Result<Self> {
        let provider = Provider::from_address(&address);
        if provider.requires_api_key(&address) && api_key.is_none() {
            if let Some(name) = provider.key_provider_name() {
                return Err(Error::ApiKeyMissing {
                    provider: name.to_string(),
                    env_var: format!("{}_API_KEY", name.to_uppercase()),
                });
            }
        }
        if let (Some(name), Some(key)) = (provider.key_provider_name(), api_key.as_deref()) {
            validate_key_format(name, key, &config.runpod_key_prefix)?;
        }
        Ok(Self { http, config, provider, address, api_key })
    }

    /// The resolved provider dialect.
    #[must_use]
    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// The attach format this provider's file encoding actually uses,
    /// honoring a forced override when the provider has no multipart
    /// contract.
    #[must_use]
    pub fn effective_attach_format(&self) -> tw_config::AttachFormat {
        self.provider.forced_attach_format().unwrap_or(self.config.upload_profile.attach_format)
    }

    /// Performs the Sending stage's initial dispatch call.
    pub async fn send(&self, endpoint_path: &str, mut data: RequestData, timeout_secs: Option<u64>) -> Result<HttpResponse> {
        let mut body = data.body.clone();
        let mut query_pairs: Vec<(String, String)> = Vec::new();

        for (name, value) in std::mem::take(&mut data.query) {
            if self.provider.folds_query_into_body() {
                body.insert(name, value);
            } else {
                query_pairs.push((name, value_to_query_string(&value)));
            }
        }

        let mut multipart_fields = Vec::new();
        for (name, slot) in &data.file {
            match slot {
                FileSlot::Attached(FileFragment::Url(url)) => {
                    body.insert(name.clone(), Value::String(url.clone()));
                }
                FileSlot::Attached(FileFragment::Attached(AttachedFile::Base64(b64))) => {
                    body.insert(name.clone(), Value::String(b64.clone()));
                }
                FileSlot::Attached(FileFragment::Attached(AttachedFile::Multipart { name: fname, content_type, bytes })) => {
                    multipart_fields.push((name.clone(), fname.clone(), content_type.clone(), bytes.clone()));
                }
                FileSlot::Loaded(_) | FileSlot::Raw(_) => {
                    return Err(Error::UploadFailed(format!("parameter {name} was never attached")));
                }
            }
        }

        if self.provider == Provider::Runpod {
            body.insert("path".to_string(), Value::String(endpoint_path.to_string()));
        }

        let url = self.provider.build_url(&self.address, endpoint_path, &query_pairs);
        if let Some(version) = self.provider.should_inject_version(&self.address, &url) {
            body.insert("version".to_string(), Value::String(version));
        }

        let wrapped_body = wrap_body(self.provider, body);

        let mut request = self.http.post(&url).timeout(self.timeout(timeout_secs));
        for (k, v) in &data.headers {
            request = request.header(k.as_str(), v.as_str());
        }

        request = if multipart_fields.is_empty() && !self.provider.forces_multipart_body() {
            request.json(&wrapped_body)
        } else {
            let mut form = reqwest::multipart::Form::new();
            for (field_name, file_name, content_type, bytes) in multipart_fields {
                let part = reqwest::multipart::Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str(&content_type)
                    .unwrap_or_else(|_| reqwest::multipart::Part::bytes(Vec::new()));
                form = form.part(field_name, part);
            }
            if let Value::Object(map) = &wrapped_body {
                for (k, v) in map {
                    form = form.text(k.clone(), value_to_query_string(v));
                }
            }
            request.multipart(form)
        };

        self.execute(request).await
    }

    /// Performs one Polling-stage tick against the previous response's
    /// `refresh_url`.
    pub async fn poll_status(&self, last: &BaseJobResponse, timeout_secs: Option<u64>) -> Result<HttpResponse> {
        let url = last
            .refresh_url
            .clone()
            .unwrap_or_else(|| format!("{}/status/{}", self.address.url(), last.id));
        let url = if url.starts_with("http") { url } else { format!("{}{}", self.address.url(), url) };

        let mut request = match self.provider.poll_method() {
            tw_model::HttpMethod::Get => self.http.get(&url),
            _ => self.http.post(&url),
        };
        request = request.timeout(self.timeout(timeout_secs));
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }
        self.execute(request).await
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<HttpResponse> {
        let response = request.send().await.map_err(|e| Error::RequestFailed(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);

        if status == 401 || status == 403 {
            return Err(Error::Unauthorized { hint: "missing or invalid API key".to_string() });
        }
        if status == 404 {
            return Err(Error::NotFound(format!("{body}")));
        }
        if !(200..300).contains(&status) {
            return Err(Error::HttpError { status, body_snippet: truncate(&body.to_string()) });
        }
        Ok(HttpResponse { status, body })
    }

    fn timeout(&self, override_secs: Option<u64>) -> Duration {
        Duration::from_secs(override_secs.unwrap_or(self.config.request_timeout_secs))
    }
}

fn wrap_body(provider: Provider, body: std::collections::BTreeMap<String, Value>) -> Value {
    match provider {
        Provider::Generic | Provider::Socaity => Value::Object(body.into_iter().collect()),
        Provider::Runpod | Provider::Replicate => {
            let mut wrapper = serde_json::Map::new();
            wrapper.insert("input".to_string(), Value::Object(body.into_iter().collect()));
            Value::Object(wrapper)
        }
    }
}

fn value_to_query_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate(s: &str) -> String {
    const MAX: usize = 500;
    if s.len() > MAX {
        format!("{}...", &s[..MAX])
    } else {
        s.to_string()
    }
}

/// Re-validates a standalone key against `provider`'s format rules without
/// constructing a client, used by callers that want to fail fast before
/// even resolving a service address.
pub fn validate_standalone_key(provider_name: &str, key: &str, runpod_key_prefix: &str) -> Result<()> {
    if key_format_for(provider_name, runpod_key_prefix).is_some() {
        validate_key_format(provider_name, key, runpod_key_prefix)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tw_model::resolve_address;

    #[test]
    fn missing_key_for_required_provider_fails() {
        let address = resolve_address("pod123", None);
        let err = Client::new(reqwest::Client::new(), ClientConfig::default(), address, None).unwrap_err();
        assert_eq!(err.kind(), "api_key_missing");
    }

    #[test]
    fn generic_provider_needs_no_key() {
        let address = resolve_address("https://example.com", None);
        let client = Client::new(reqwest::Client::new(), ClientConfig::default(), address, None);
        assert!(client.is_ok());
    }

    #[test]
    fn invalid_key_format_is_rejected() {
        let address = resolve_address("user/model:v1", None);
        let err = Client::new(reqwest::Client::new(), ClientConfig::default(), address, Some("bad".into()))
            .unwrap_err();
        assert_eq!(err.kind(), "api_key_invalid");
    }

    #[tokio::test]
    async fn socaity_body_is_always_multipart_with_flat_fields() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "j1",
                "status": "QUEUED",
                "endpoint_protocol": "socaity",
            })))
            .mount(&server)
            .await;

        let address = resolve_address(&server.uri(), Some(tw_model::AddressHint::Socaity));
        let client = Client::new(reqwest::Client::new(), ClientConfig::default(), address, None).unwrap();

        let mut data = RequestData::default();
        data.body.insert("text".to_string(), Value::String("hi".to_string()));
        data.body.insert("voice".to_string(), Value::String("alice".to_string()));

        let response = client.send("/tts", data, None).await.unwrap();
        assert_eq!(response.status, 200);

        let request = &server.received_requests().await.unwrap()[0];
        let content_type = request.headers.get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.starts_with("multipart/form-data"));
        let body = String::from_utf8_lossy(&request.body);
        assert!(body.contains("name=\"text\""));
        assert!(body.contains("hi"));
        assert!(body.contains("name=\"voice\""));
        assert!(body.contains("alice"));
        assert!(!body.contains("\"input\""));
    }
}
