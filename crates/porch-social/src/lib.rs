//! Social graph derivation, feed scoping, conversations and the store
//! boundaries they run against.
//!
//! Everything here is synchronous: stores are expected to be blocking
//! (SQLite behind a mutex), so async callers run these functions on
//! `spawn_blocking`.

pub mod conversation;
pub mod error;
pub mod events;
pub mod feed;
pub mod follow;
pub mod graph;
pub mod lock;
pub mod notifications;
pub mod posts;
pub mod profiles;
pub mod reconcile;
pub mod store;

#[cfg(any(test, feature = "testing"))]
pub mod memory;

pub use error::{SocialError, SocialResult};
pub use events::{DomainEvent, EventSink};
