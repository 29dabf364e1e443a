//! Lifecycle events for validated chat calls and transport retries.
//!
//! Implement [`EventHandler`] to observe attempts as they happen, for
//! progress reporting or metrics. This is entirely optional.

use std::sync::Arc;

/// Events emitted while a request is processed.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A validated attempt is about to call the completion backend.
    AttemptStart {
        /// Prompt name of the call.
        prompt: String,
        /// Attempt number (1-indexed).
        attempt: u32,
    },
    /// A validated attempt did not produce usable data.
    AttemptFailed {
        prompt: String,
        attempt: u32,
        /// Parse error, schema violation or backend fault description.
        reason: String,
    },
    /// A validated call finished.
    ValidationEnd {
        prompt: String,
        /// Completion calls made.
        attempts: u32,
        success: bool,
    },
    /// A transport-level retry due to a transient HTTP error.
    TransportRetry {
        /// Operation being retried (`"chat"`, `"speech"`, `"transcription"`).
        operation: &'static str,
        /// The retry attempt number (1-indexed).
        attempt: u32,
        /// Delay before this retry attempt in milliseconds.
        delay_ms: u64,
        reason: String,
    },
}

/// Handler for lifecycle events.
///
/// # Example
///
/// ```
/// use ai_manager::events::{Event, EventHandler};
///
/// struct PrintHandler;
///
/// impl EventHandler for PrintHandler {
///     fn on_event(&self, event: Event) {
///         if let Event::AttemptFailed { prompt, attempt, reason } = event {
///             eprintln!("[{}] attempt {} failed: {}", prompt, attempt, reason);
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: Event);
}

/// Emit an event if a handler is present. No-op otherwise.
pub(crate) fn emit(handler: &Option<Arc<dyn EventHandler>>, event: Event) {
    if let Some(ref h) = handler {
        h.on_event(event);
    }
}

/// An [`EventHandler`] backed by a closure.
///
/// ```
/// use ai_manager::events::{Event, FnEventHandler};
/// use std::sync::Arc;
///
/// let handler = Arc::new(FnEventHandler(|event: Event| {
///     if let Event::ValidationEnd { success, .. } = event {
///         println!("done, success={}", success);
///     }
/// }));
/// ```
pub struct FnEventHandler<F: Fn(Event) + Send + Sync>(pub F);

impl<F: Fn(Event) + Send + Sync> EventHandler for FnEventHandler<F> {
    fn on_event(&self, event: Event) {
        (self.0)(event);
    }
}
