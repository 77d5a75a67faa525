//! Shared request/response state threaded through one dispatch.
//!
//! The contexts are owned by the dispatching layer (typically the HTTP
//! front-end, which is outside this crate) and borrowed mutably by the
//! [`Event`](crate::pipeline::Event) for the duration of a single dispatch.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::fingerprint::{FingerprintInput, TransformDescriptor};

/// Order-preserving, case-insensitive header multimap.
///
/// Insertion order and duplicate names survive a round-trip through the
/// cache record format, so replaying cached headers reproduces the original
/// response exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every value stored under `name` with a single value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.entries.push((name, value.into()));
    }

    /// Add a value without disturbing existing values for the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value stored under `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value stored under `name`, in insertion order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A prepared media payload together with the facts listeners care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Media {
    pub payload: Bytes,
    pub mime_type: String,
    pub extension: String,
    pub width: u32,
    pub height: u32,
}

/// Body of the in-flight response.
#[derive(Debug, Clone)]
pub enum ResponseModel {
    /// A derived media payload; its content type and related facts travel in
    /// the response headers.
    Media(Bytes),
    /// Any non-media body (error documents, metadata listings).
    Document(serde_json::Value),
}

/// Request-side state for one media operation.
#[derive(Debug, Clone)]
pub struct RequestContext {
    owner_id: String,
    asset_id: String,
    accept: Option<String>,
    extension: Option<String>,
    transform_chain: Vec<TransformDescriptor>,
    body: Option<Bytes>,
    media: Option<Media>,
}

impl RequestContext {
    pub fn new(owner_id: impl Into<String>, asset_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            asset_id: asset_id.into(),
            accept: None,
            extension: None,
            transform_chain: Vec::new(),
            body: None,
            media: None,
        }
    }

    /// Raw `Accept` header value as received from the client.
    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    /// Requested target format, taken from the URL extension.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    pub fn with_transform_chain(mut self, chain: Vec<TransformDescriptor>) -> Self {
        self.transform_chain = chain;
        self
    }

    /// Raw inbound payload, present on store operations.
    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }

    pub fn accept(&self) -> Option<&str> {
        self.accept.as_deref()
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn transform_chain(&self) -> &[TransformDescriptor] {
        &self.transform_chain
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Media attached by a preparation listener, if any.
    pub fn media(&self) -> Option<&Media> {
        self.media.as_ref()
    }

    pub fn set_media(&mut self, media: Media) {
        self.media = Some(media);
    }

    /// Snapshot of the attributes that determine the cache fingerprint.
    pub fn fingerprint_input(&self) -> FingerprintInput {
        FingerprintInput::new(&self.owner_id, &self.asset_id)
            .with_accept(self.accept.clone())
            .with_extension(self.extension.clone())
            .with_transform_chain(self.transform_chain.clone())
    }
}

/// Response-side state for one media operation.
#[derive(Debug, Default)]
pub struct ResponseContext {
    headers: HeaderMap,
    model: Option<ResponseModel>,
}

impl ResponseContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Swap in a complete header set, e.g. when replaying a cached response.
    pub fn replace_headers(&mut self, headers: HeaderMap) {
        self.headers = headers;
    }

    pub fn model(&self) -> Option<&ResponseModel> {
        self.model.as_ref()
    }

    pub fn set_model(&mut self, model: ResponseModel) {
        self.model = Some(model);
    }

    /// The media payload carried by the response model, if that is what it is.
    pub fn media(&self) -> Option<&Bytes> {
        match &self.model {
            Some(ResponseModel::Media(payload)) => Some(payload),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_all_values_for_a_name() {
        let mut headers = HeaderMap::new();
        headers.append("Cache-Control", "no-store");
        headers.append("cache-control", "private");
        headers.set("Cache-Control", "public");

        assert_eq!(headers.get_all("cache-control"), vec!["public"]);
    }

    #[test]
    fn append_preserves_duplicates_and_order() {
        let mut headers = HeaderMap::new();
        headers.append("Vary", "Accept");
        headers.append("Vary", "Accept-Encoding");

        assert_eq!(headers.get("vary"), Some("Accept"));
        assert_eq!(headers.get_all("Vary"), vec!["Accept", "Accept-Encoding"]);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.set("Content-Type", "image/png");

        assert!(headers.contains("content-type"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("image/png"));
    }

    #[test]
    fn fingerprint_input_mirrors_request_attributes() {
        let request = RequestContext::new("abc", "a1b2")
            .with_accept("image/png")
            .with_extension("jpg");

        let input = request.fingerprint_input();
        assert_eq!(input.owner_id(), "abc");
        assert_eq!(input.asset_id(), "a1b2");
        assert_eq!(input.variant_extension(), Some("jpg"));
    }

    #[test]
    fn response_media_accessor_ignores_documents() {
        let mut response = ResponseContext::new();
        response.set_model(ResponseModel::Document(serde_json::json!({"error": 404})));
        assert!(response.media().is_none());
    }
}
