//! Ember+ consumer
//!
//! The consumer mirrors a provider's tree over an S101/BER session. All
//! protocol state lives in a per-session task; the [`Consumer`] facade
//! talks to it over a command mailbox, which serializes requests the way
//! the half-duplex protocol requires.

pub mod consumer;
pub mod events;
pub mod pipeline;
pub mod session;

pub use consumer::Consumer;
pub use events::ConsumerEvent;
pub use pipeline::Response;
