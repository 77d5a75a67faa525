//! Event dispatch pipeline.
//!
//! Media operations fire named events; listeners registered with the
//! [`EventManager`] run in descending priority order, sharing one mutable
//! [`Event`] per occurrence. A listener can stop propagation to short-circuit
//! everything registered below it, which is how a cache hit skips the
//! transformation work entirely.

mod event;
mod manager;

pub use event::Event;
pub use manager::{Dispatch, EventManager, Listener, ListenerError, RegistrationError};

/// Well-known pipeline event names.
pub mod events {
    /// A client requests a (possibly transformed) media asset.
    pub const MEDIA_GET: &str = "media.get";
    /// A client uploads a new original asset.
    pub const MEDIA_STORE: &str = "media.store";
    /// A client deletes an original asset.
    pub const MEDIA_DELETE: &str = "media.delete";
    /// The response is about to be written to the client.
    pub const RESPONSE_SEND: &str = "response.send";
}
