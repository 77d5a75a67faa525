//! Ombra media pipeline core.
//!
//! Incoming media operations (fetch, store, delete) fire named events through
//! the [`pipeline::EventManager`]; registered listeners react in descending
//! priority order and may short-circuit one another. Listeners that produce
//! expensive derived artifacts lean on the [`cache::ArtifactCache`], an
//! on-disk, hierarchically sharded store keyed by a deterministic
//! [`fingerprint::Fingerprint`] of the request.
//!
//! HTTP plumbing, media codecs and original-asset storage are external
//! collaborators reached through the traits in [`engine`].

pub mod cache;
pub mod config;
pub mod context;
pub mod engine;
pub mod fingerprint;
pub mod listeners;
pub mod pipeline;
pub mod telemetry;

pub use cache::{ArtifactCache, CacheEntry};
pub use context::{HeaderMap, Media, RequestContext, ResponseContext, ResponseModel};
pub use fingerprint::{Fingerprint, FingerprintInput, TransformDescriptor};
pub use pipeline::{Dispatch, Event, EventManager, Listener, ListenerError, RegistrationError};
