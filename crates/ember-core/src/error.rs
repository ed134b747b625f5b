//! Core Error Types
//!
//! Only two failure classes ever reach a caller: configuration errors
//! (fatal at construction) and state errors (engine misuse or poisoned
//! shared state). Client failures are absorbed into diagnostics or empty
//! phases per the degradation policy; budget overruns are logged and
//! truncated in place.

/// Error raised to callers of the core
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum EmberError {
    /// Missing or invalid configuration; fatal at construction
    #[error("configuration error: {0}")]
    Config(String),
    /// Engine used before construction completed, or shared state poisoned
    #[error("state error: {0}")]
    State(String),
}

/// Core result type
pub type Result<T> = std::result::Result<T, EmberError>;
