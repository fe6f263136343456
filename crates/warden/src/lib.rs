//! Top-level facade crate for warden.
//!
//! Re-exports core types and the mediator library so users can depend on a single crate.

pub mod core {
    pub use warden_core::*;
}

pub mod mediator {
    pub use warden_mediator::*;
}
