//! Media preparation listener.
//!
//! Runs first on `media.store`: validates the uploaded payload, verifies the
//! asset id is the checksum of the bytes, decodes dimensions and media type
//! through the engine, and attaches the prepared [`Media`] to the request for
//! downstream listeners.

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::context::Media;
use crate::engine::MediaEngine;
use crate::pipeline::{Event, EventManager, Listener, ListenerError, RegistrationError, events};

const PREPARE_PRIORITY: i32 = 50;

pub struct MediaPreparation {
    engine: Arc<dyn MediaEngine>,
}

impl MediaPreparation {
    pub fn new(engine: Arc<dyn MediaEngine>) -> Self {
        Self { engine }
    }

    /// Register this listener ahead of everything else on `media.store`.
    pub fn attach(self, events: &mut EventManager) -> Result<(), RegistrationError> {
        events.register(events::MEDIA_STORE, PREPARE_PRIORITY, Arc::new(self))
    }

    async fn prepare(&self, event: &mut Event<'_>) -> Result<(), ListenerError> {
        let body = match event.request().body() {
            Some(body) if !body.is_empty() => body.clone(),
            _ => return Err(ListenerError::validation("no media attached")),
        };

        let checksum = hex::encode(Sha256::digest(&body));
        if checksum != event.request().asset_id() {
            return Err(ListenerError::validation(
                "asset id does not match the payload checksum",
            ));
        }

        let info = self.engine.decode_metadata(&body).await?;
        let extension = extension_for(&info.mime_type).ok_or_else(|| {
            ListenerError::validation(format!("unsupported media type: {}", info.mime_type))
        })?;

        event.request_mut().set_media(Media {
            payload: body,
            mime_type: info.mime_type,
            extension: extension.to_string(),
            width: info.width,
            height: info.height,
        });

        Ok(())
    }
}

#[async_trait]
impl Listener for MediaPreparation {
    async fn handle(&self, event: &mut Event<'_>) -> Result<(), ListenerError> {
        match event.name() {
            events::MEDIA_STORE => self.prepare(event).await,
            _ => Ok(()),
        }
    }
}

/// Canonical file extension for the media types the pipeline accepts.
fn extension_for(mime_type: &str) -> Option<&'static str> {
    match mime_type {
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use crate::context::{RequestContext, ResponseContext};
    use crate::engine::{EngineError, MediaInfo};
    use crate::fingerprint::TransformDescriptor;

    use super::*;

    struct StubEngine {
        mime_type: &'static str,
        broken: bool,
    }

    #[async_trait]
    impl MediaEngine for StubEngine {
        async fn transform(
            &self,
            payload: Bytes,
            _chain: &[TransformDescriptor],
        ) -> Result<Bytes, EngineError> {
            Ok(payload)
        }

        async fn decode_metadata(&self, _payload: &[u8]) -> Result<MediaInfo, EngineError> {
            if self.broken {
                return Err(EngineError::BrokenPayload);
            }
            Ok(MediaInfo {
                width: 640,
                height: 480,
                mime_type: self.mime_type.to_string(),
            })
        }
    }

    fn manager(engine: StubEngine) -> EventManager {
        let mut events = EventManager::new();
        MediaPreparation::new(Arc::new(engine))
            .attach(&mut events)
            .expect("attach");
        events
    }

    fn store_request(body: &'static [u8]) -> RequestContext {
        let payload = Bytes::from_static(body);
        let asset_id = hex::encode(Sha256::digest(&payload));
        RequestContext::new("abc", asset_id).with_body(payload)
    }

    #[tokio::test]
    async fn valid_payload_attaches_prepared_media() {
        let events = manager(StubEngine {
            mime_type: "image/png",
            broken: false,
        });

        let mut req = store_request(b"png bytes");
        let mut resp = ResponseContext::new();
        events
            .dispatch(events::MEDIA_STORE, &mut req, &mut resp)
            .await
            .expect("dispatch");

        let media = req.media().expect("media attached");
        assert_eq!(media.mime_type, "image/png");
        assert_eq!(media.extension, "png");
        assert_eq!((media.width, media.height), (640, 480));
    }

    #[tokio::test]
    async fn missing_payload_is_rejected() {
        let events = manager(StubEngine {
            mime_type: "image/png",
            broken: false,
        });

        let mut req = RequestContext::new("abc", "whatever");
        let mut resp = ResponseContext::new();
        let err = events
            .dispatch(events::MEDIA_STORE, &mut req, &mut resp)
            .await
            .expect_err("rejected");
        assert!(matches!(err, ListenerError::Validation { .. }));
    }

    #[tokio::test]
    async fn checksum_mismatch_is_rejected() {
        let events = manager(StubEngine {
            mime_type: "image/png",
            broken: false,
        });

        let mut req =
            RequestContext::new("abc", "not-the-checksum").with_body(Bytes::from_static(b"bytes"));
        let mut resp = ResponseContext::new();
        let err = events
            .dispatch(events::MEDIA_STORE, &mut req, &mut resp)
            .await
            .expect_err("rejected");
        assert!(matches!(err, ListenerError::Validation { .. }));
        assert!(req.media().is_none());
    }

    #[tokio::test]
    async fn unsupported_media_type_is_rejected() {
        let events = manager(StubEngine {
            mime_type: "application/pdf",
            broken: false,
        });

        let mut req = store_request(b"pdf bytes");
        let mut resp = ResponseContext::new();
        let err = events
            .dispatch(events::MEDIA_STORE, &mut req, &mut resp)
            .await
            .expect_err("rejected");
        assert!(matches!(err, ListenerError::Validation { .. }));
    }

    #[tokio::test]
    async fn undecodable_payload_surfaces_the_engine_error() {
        let events = manager(StubEngine {
            mime_type: "image/png",
            broken: true,
        });

        let mut req = store_request(b"broken");
        let mut resp = ResponseContext::new();
        let err = events
            .dispatch(events::MEDIA_STORE, &mut req, &mut resp)
            .await
            .expect_err("rejected");
        assert!(matches!(err, ListenerError::Engine(_)));
    }
}
