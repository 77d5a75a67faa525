//! Transform pipeline listener.
//!
//! The low-priority tail of `media.get`: when no cached artifact satisfied
//! the request, it fetches the original bytes from the asset store, applies
//! the requested transform chain through the engine, and sets the response
//! model. The cache listener then captures the result on `response.send`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::ResponseModel;
use crate::engine::{AssetStore, MediaEngine};
use crate::pipeline::{Event, EventManager, Listener, ListenerError, RegistrationError, events};

const TRANSFORM_PRIORITY: i32 = 0;

pub struct TransformPipeline {
    assets: Arc<dyn AssetStore>,
    engine: Arc<dyn MediaEngine>,
}

impl TransformPipeline {
    pub fn new(assets: Arc<dyn AssetStore>, engine: Arc<dyn MediaEngine>) -> Self {
        Self { assets, engine }
    }

    /// Register this listener at the tail of `media.get`.
    pub fn attach(self, events: &mut EventManager) -> Result<(), RegistrationError> {
        events.register(events::MEDIA_GET, TRANSFORM_PRIORITY, Arc::new(self))
    }

    async fn serve(&self, event: &mut Event<'_>) -> Result<(), ListenerError> {
        if event.response().media().is_some() {
            return Ok(());
        }

        let request = event.request();
        let original = self
            .assets
            .fetch(request.owner_id(), request.asset_id())
            .await?
            .ok_or(ListenerError::AssetNotFound)?;

        let payload = self
            .engine
            .transform(original, request.transform_chain())
            .await?;
        let info = self.engine.decode_metadata(&payload).await?;

        let response = event.response_mut();
        response.headers_mut().set("Content-Type", info.mime_type);
        response.set_model(ResponseModel::Media(payload));

        Ok(())
    }
}

#[async_trait]
impl Listener for TransformPipeline {
    async fn handle(&self, event: &mut Event<'_>) -> Result<(), ListenerError> {
        match event.name() {
            events::MEDIA_GET => self.serve(event).await,
            _ => Ok(()),
        }
    }
}
