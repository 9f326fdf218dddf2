// SPDX-License-Identifier: MIT OR Apache-2.0
//! Media-result decoding: a job's `result` may carry one or more
//! `{file_name, content_type, content}` shapes, or plain URLs, and this
//! module reduces either into concrete [`MediaFile`] values.

use base64::Engine;
use serde_json::Value;
use tw_files::{MediaContent, MediaFile};
use tw_model::{Error, Result};

const REPLICATE_DELIVERY_HOST: &str = "replicate.delivery";

/// Decodes a job result into zero or more media files. Accepts a single
/// `{file_name, content_type, content}` object, a list of such objects, a
/// bare URL string, or a list of URL strings.
pub fn decode_result_media(result: &Value) -> Vec<MediaFile> {
    match result {
        Value::Array(items) => items.iter().filter_map(decode_one).collect(),
        other => decode_one(other).into_iter().collect(),
    }
}

fn decode_one(value: &Value) -> Option<MediaFile> {
    if let Value::String(url) = value {
        if !looks_like_url(url) {
            return None;
        }
        return Some(MediaFile {
            name: url.rsplit('/').next().unwrap_or("file").to_string(),
            content_type: tw_files::guess_content_type(url),
            content: MediaContent::Url(url.clone()),
        });
    }
    let obj = value.as_object()?;
    let file_name = obj.get("file_name").and_then(Value::as_str)?.to_string();
    let content_type = obj
        .get("content_type")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| tw_files::guess_content_type(&file_name));
    let content = match obj.get("content")?.as_str()? {
        raw if looks_like_url(raw) => MediaContent::Url(raw.to_string()),
        raw => MediaContent::Bytes(base64::engine::general_purpose::STANDARD.decode(raw).ok()?),
    };
    Some(MediaFile { name: file_name, content_type, content })
}

fn looks_like_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Whether `file` is a URL on Replicate's delivery host, and so eligible
/// for the lazy fetch Replicate results require (Replicate never inlines
/// bytes; every result is a short-lived signed URL).
#[must_use]
pub fn is_replicate_delivery_url(file: &MediaFile) -> bool {
    matches!(&file.content, MediaContent::Url(url) if url.contains(REPLICATE_DELIVERY_HOST))
}

/// Fetches a Replicate delivery URL's bytes, replacing the file's content
/// in place. No-op for files that are not delivery URLs.
pub async fn fetch_replicate_delivery(http: &reqwest::Client, file: &mut MediaFile) -> Result<()> {
    let MediaContent::Url(url) = &file.content else { return Ok(()) };
    if !url.contains(REPLICATE_DELIVERY_HOST) {
        return Ok(());
    }
    let response = http.get(url.as_str()).send().await.map_err(|e| Error::RequestFailed(e.to_string()))?;
    if !response.status().is_success() {
        return Err(Error::RequestFailed(format!("delivery fetch failed: {}", response.status())));
    }
    let bytes = response.bytes().await.map_err(|e| Error::RequestFailed(e.to_string()))?;
    file.content = MediaContent::Bytes(bytes.to_vec());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_file_object_decodes() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"hello");
        let result = json!({"file_name": "a.txt", "content_type": "text/plain", "content": encoded});
        let files = decode_result_media(&result);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].content, MediaContent::Bytes(b"hello".to_vec()));
    }

    #[test]
    fn list_of_urls_decodes_in_order() {
        let result = json!(["https://x/a.png", "https://x/b.png"]);
        let files = decode_result_media(&result);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].content, MediaContent::Url("https://x/a.png".to_string()));
        assert_eq!(files[1].content, MediaContent::Url("https://x/b.png".to_string()));
    }

    #[test]
    fn plain_text_result_decodes_to_no_media() {
        assert!(decode_result_media(&json!("hello")).is_empty());
    }

    #[test]
    fn replicate_delivery_url_is_flagged_for_lazy_fetch() {
        let file = MediaFile {
            name: "x.png".into(),
            content_type: "image/png".into(),
            content: MediaContent::Url("https://replicate.delivery/pbxt/abc/x.png".into()),
        };
        assert!(is_replicate_delivery_url(&file));
    }

    #[test]
    fn non_delivery_url_is_not_flagged() {
        let file = MediaFile {
            name: "x.png".into(),
            content_type: "image/png".into(),
            content: MediaContent::Url("https://cdn.example.com/x.png".into()),
        };
        assert!(!is_replicate_delivery_url(&file));
    }
}
