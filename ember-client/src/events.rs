//! Consumer events
//!
//! Events are broadcast to every subscriber of [`Consumer::events`]; a
//! lagging subscriber only loses its own backlog, never the session.
//!
//! [`Consumer::events`]: crate::consumer::Consumer::events

use ember_core::Value;
use ember_glow::Path;

/// An event emitted during the lifetime of a consumer session
#[derive(Debug, Clone, PartialEq)]
pub enum ConsumerEvent {
    /// Transport connect started
    Connecting,
    /// Session is up
    Connected,
    /// Session ended (clean or after failure)
    Disconnected,
    /// Session-wide failure; pending requests have been failed
    Error(String),
    /// A parameter value changed (solicited, unsolicited or via stream)
    ValueChange { path: Path, value: Value },
    /// A function invocation completed
    InvocationResult {
        invocation_id: i64,
        success: bool,
        result: Vec<Value>,
    },
}

impl ConsumerEvent {
    /// Check whether this event ends the session
    #[must_use]
    pub fn is_termination(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// Check whether this is a value update
    #[must_use]
    pub fn is_value_change(&self) -> bool {
        matches!(self, Self::ValueChange { .. })
    }
}
