//! Shared error type across warden crates.

use thiserror::Error;

use crate::call::CallerIdentity;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid input / malformed configuration.
    BadRequest,
    /// Unsupported configuration version.
    UnsupportedVersion,
    /// A strict-mode call was blocked by policy.
    PolicyViolation,
    /// Remote audit sink failed.
    Transport,
    /// Internal error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ClientCode::PolicyViolation => "POLICY_VIOLATION",
            ClientCode::Transport => "TRANSPORT",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Details of a blocked call raised on the fatal signal channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Id of the matched rule, or `"default"` when no rule matched.
    pub rule: String,
    pub caller: CallerIdentity,
    pub primitive: String,
    /// Pointer to the operator documentation for mediated calls.
    pub reference: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "restricted caller {} tried to call native {} (rule: {}). Ref: {}",
            self.caller, self.primitive, self.rule, self.reference
        )
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, WardenError>;

/// Unified error type used by core and mediator.
#[derive(Debug, Error)]
pub enum WardenError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("policy violation: {0}")]
    PolicyViolation(Box<Violation>),
    #[error("transport: {0}")]
    Transport(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl WardenError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            WardenError::BadRequest(_) => ClientCode::BadRequest,
            WardenError::UnsupportedVersion => ClientCode::UnsupportedVersion,
            WardenError::PolicyViolation(_) => ClientCode::PolicyViolation,
            WardenError::Transport(_) => ClientCode::Transport,
            WardenError::Internal(_) => ClientCode::Internal,
        }
    }

    /// Violation details when this is a strict-mode block.
    pub fn violation(&self) -> Option<&Violation> {
        match self {
            WardenError::PolicyViolation(v) => Some(v),
            _ => None,
        }
    }
}
