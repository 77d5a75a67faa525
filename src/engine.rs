//! Seams to the external collaborators.
//!
//! The pipeline never decodes, transforms or fetches original bytes itself;
//! it consumes these capabilities through trait objects supplied by the
//! embedding application.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::fingerprint::TransformDescriptor;

/// Failures reported by the media-processing engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unsupported media type: {mime_type}")]
    UnsupportedMediaType { mime_type: String },
    #[error("broken media payload")]
    BrokenPayload,
    #[error("transformation {name} failed: {message}")]
    TransformationFailed { name: String, message: String },
}

/// Facts the engine can read off a payload without transforming it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInfo {
    pub width: u32,
    pub height: u32,
    pub mime_type: String,
}

/// The external media-processing engine.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Apply `chain` to `payload` in order; transformations do not commute.
    async fn transform(
        &self,
        payload: Bytes,
        chain: &[TransformDescriptor],
    ) -> Result<Bytes, EngineError>;

    /// Decode dimensions and media type from raw payload bytes.
    async fn decode_metadata(&self, payload: &[u8]) -> Result<MediaInfo, EngineError>;
}

/// Failures reported by the original-asset storage backend.
#[derive(Debug, Error)]
pub enum AssetStoreError {
    #[error("asset store backend failed: {message}")]
    Backend { message: String },
}

impl AssetStoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

/// The external store holding original (untransformed) assets.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Fetch the original bytes for `(owner_id, asset_id)`, if stored.
    async fn fetch(&self, owner_id: &str, asset_id: &str) -> Result<Option<Bytes>, AssetStoreError>;
}
