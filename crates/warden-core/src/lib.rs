//! warden core: call descriptors, caller identities, primitive groups and
//! the shared error surface.
//!
//! This crate defines the contracts shared by the mediator, its HTTP
//! surface, and any host-side interception layer. It intentionally carries no
//! transport or runtime dependencies so it can be linked into the host.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `WardenError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod call;
pub mod error;
pub mod groups;

/// Shared result type.
pub use error::{Result, WardenError};

pub use call::{CallDescriptor, CallerIdentity, Effect};
pub use groups::GroupRegistry;
