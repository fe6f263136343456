//! Mediation facade: policy decision -> enforcement + audit.

pub mod facade;

pub use facade::{Mediator, Verdict};
