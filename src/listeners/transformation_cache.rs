//! Transformation cache listener.
//!
//! Serves derived artifacts from the [`ArtifactCache`] so each transformation
//! is generated once: it answers `media.get` from the cache when possible
//! (stopping propagation so the transform pipeline never runs), captures
//! outgoing media on `response.send`, and drops the whole `(owner, asset)`
//! subtree on `media.delete`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::{ArtifactCache, CacheEntry};
use crate::context::ResponseModel;
use crate::pipeline::{Event, EventManager, Listener, ListenerError, RegistrationError, events};

/// Response header announcing whether the artifact came from the cache.
pub const CACHE_STATE_HEADER: &str = "X-Transformation-Cache";

const LOAD_PRIORITY: i32 = 20;
const STORE_PRIORITY: i32 = 10;
const DELETE_PRIORITY: i32 = 10;

pub struct TransformationCache {
    cache: Arc<ArtifactCache>,
}

impl TransformationCache {
    pub fn new(cache: Arc<ArtifactCache>) -> Self {
        Self { cache }
    }

    /// Register this listener on the events it subscribes to.
    pub fn attach(self, events: &mut EventManager) -> Result<(), RegistrationError> {
        let listener: Arc<dyn Listener> = Arc::new(self);
        // Look for cached artifacts before any transformation occurs.
        events.register(events::MEDIA_GET, LOAD_PRIORITY, Arc::clone(&listener))?;
        // Capture artifacts before they are sent to the user agent.
        events.register(events::RESPONSE_SEND, STORE_PRIORITY, Arc::clone(&listener))?;
        // Drop cached variants when the original asset is deleted.
        events.register(events::MEDIA_DELETE, DELETE_PRIORITY, listener)?;
        Ok(())
    }

    async fn load_from_cache(&self, event: &mut Event<'_>) {
        let input = event.request().fingerprint_input();

        match self.cache.lookup(&input).await {
            Some(CacheEntry {
                payload,
                mut headers,
            }) => {
                headers.set(CACHE_STATE_HEADER, "Hit");

                let response = event.response_mut();
                response.replace_headers(headers);
                response.set_model(ResponseModel::Media(payload));

                event.stop_propagation();
            }
            None => {
                event
                    .response_mut()
                    .headers_mut()
                    .set(CACHE_STATE_HEADER, "Miss");
            }
        }
    }

    async fn store_in_cache(&self, event: &mut Event<'_>) {
        // Only media payloads are cached; error documents and listings pass
        // through untouched.
        let Some(payload) = event.response().media() else {
            return;
        };

        let input = event.request().fingerprint_input();
        let entry = CacheEntry::new(payload.clone(), event.response().headers().clone());
        self.cache.store(&input, &entry).await;
    }

    async fn delete_from_cache(&self, event: &mut Event<'_>) {
        let request = event.request();
        self.cache
            .invalidate(request.owner_id(), request.asset_id())
            .await;
    }
}

#[async_trait]
impl Listener for TransformationCache {
    async fn handle(&self, event: &mut Event<'_>) -> Result<(), ListenerError> {
        match event.name() {
            events::MEDIA_GET => self.load_from_cache(event).await,
            events::RESPONSE_SEND => self.store_in_cache(event).await,
            events::MEDIA_DELETE => self.delete_from_cache(event).await,
            _ => {}
        }
        Ok(())
    }
}
