//! warden mediator library entry.
//!
//! This crate wires the policy engine, the audit log buffer and its remote
//! sink, the mediation facade, and the HTTP decision service into one stack.
//! It is consumed by the binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod audit;
pub mod config;
pub mod mediation;
pub mod obs;
pub mod policy;
pub mod router;
pub mod transport;
