//! Listener registry and dispatcher.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::context::{RequestContext, ResponseContext};
use crate::engine::{AssetStoreError, EngineError};

use super::event::Event;

/// Errors surfaced by a failing listener.
///
/// A listener error is fatal to its dispatch: it reaches the dispatch caller
/// unchanged, is never retried, and stops the remaining listeners from
/// running. Listeners are responsible for leaving the contexts consistent on
/// failure; the dispatcher performs no rollback.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("{message}")]
    Validation { message: String },
    #[error("asset not found")]
    AssetNotFound,
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Assets(#[from] AssetStoreError),
    #[error(transparent)]
    Other(Box<dyn StdError + Send + Sync>),
}

impl ListenerError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn other(err: impl StdError + Send + Sync + 'static) -> Self {
        Self::Other(Box::new(err))
    }
}

/// Errors detected when a listener is registered.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("event name must not be empty")]
    EmptyEventName,
}

/// Reacts to a pipeline event.
///
/// One implementation may register for several events (or the same event at
/// several priorities) and branch on [`Event::name`].
#[async_trait]
pub trait Listener: Send + Sync {
    async fn handle(&self, event: &mut Event<'_>) -> Result<(), ListenerError>;
}

/// Outcome of one dispatch. The event itself borrows caller state and cannot
/// outlive the call, so the dispatcher reports the facts callers act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    pub listeners_invoked: usize,
    pub propagation_stopped: bool,
}

struct Registration {
    priority: i32,
    listener: Arc<dyn Listener>,
}

/// Holds listener registrations and dispatches events to them.
///
/// Registrations are added at startup (`&mut self`) and read-only during
/// dispatch, so no synchronization is needed.
#[derive(Default)]
pub struct EventManager {
    listeners: HashMap<String, Vec<Registration>>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `event_name` at `priority`.
    ///
    /// Higher priorities run first; listeners at equal priority run in
    /// registration order. The per-event list is kept sorted on insert.
    pub fn register(
        &mut self,
        event_name: &str,
        priority: i32,
        listener: Arc<dyn Listener>,
    ) -> Result<(), RegistrationError> {
        if event_name.trim().is_empty() {
            return Err(RegistrationError::EmptyEventName);
        }

        let list = self.listeners.entry(event_name.to_string()).or_default();
        let at = list.partition_point(|reg| reg.priority >= priority);
        list.insert(at, Registration { priority, listener });
        Ok(())
    }

    /// Fire `name` once, invoking its listeners in order with a shared event.
    ///
    /// Stops as soon as a listener sets the propagation flag. A listener
    /// error aborts the dispatch and propagates to the caller unchanged. A
    /// name with no registrations dispatches successfully with zero
    /// invocations.
    pub async fn dispatch<'a>(
        &self,
        name: &'a str,
        request: &'a mut RequestContext,
        response: &'a mut ResponseContext,
    ) -> Result<Dispatch, ListenerError> {
        let registrations = match self.listeners.get(name) {
            Some(registrations) => registrations,
            None => {
                debug!(event = name, "no listeners registered");
                return Ok(Dispatch {
                    listeners_invoked: 0,
                    propagation_stopped: false,
                });
            }
        };

        let mut event = Event::new(name, request, response);
        let mut invoked = 0;

        for registration in registrations {
            registration.listener.handle(&mut event).await?;
            invoked += 1;
            if event.is_propagation_stopped() {
                break;
            }
        }

        let outcome = Dispatch {
            listeners_invoked: invoked,
            propagation_stopped: event.is_propagation_stopped(),
        };
        debug!(
            event = name,
            listeners = outcome.listeners_invoked,
            stopped = outcome.propagation_stopped,
            "event dispatched"
        );
        Ok(outcome)
    }
}
