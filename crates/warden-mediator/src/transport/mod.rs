//! Transport layer (HTTP decision service).

pub mod http;
