//! The event object shared by every listener of one dispatch.

use crate::context::{RequestContext, ResponseContext};

/// One occurrence of a named pipeline event.
///
/// The event borrows the caller-owned request/response contexts for the
/// duration of a single dispatch and is dropped when dispatch returns; it is
/// never persisted. Listener side effects happen by mutating the contexts
/// reachable from here.
pub struct Event<'a> {
    name: &'a str,
    request: &'a mut RequestContext,
    response: &'a mut ResponseContext,
    propagation_stopped: bool,
}

impl<'a> Event<'a> {
    pub(crate) fn new(
        name: &'a str,
        request: &'a mut RequestContext,
        response: &'a mut ResponseContext,
    ) -> Self {
        Self {
            name,
            request,
            response,
            propagation_stopped: false,
        }
    }

    /// Name of the occurring event, e.g. `media.get`.
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn request(&self) -> &RequestContext {
        self.request
    }

    pub fn request_mut(&mut self) -> &mut RequestContext {
        self.request
    }

    pub fn response(&self) -> &ResponseContext {
        self.response
    }

    pub fn response_mut(&mut self) -> &mut ResponseContext {
        self.response
    }

    /// Prevent any lower-priority listener from running for this occurrence.
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}
