use std::collections::TryReserveError;

/// Error taxonomy for the containers in this crate.
///
/// `RangeError` and `LogicError` cover precondition violations (caller
/// bugs); `ResourceExhausted` covers allocator growth failure. Not-found
/// lookups and no-op mutations are never errors — they come back as
/// `None`/`false`, per the crate's error handling design.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("rank out of range: {0}")]
    RangeError(String),
    #[error("logic error: {0}")]
    LogicError(String),
    #[error("allocator could not grow: {0}")]
    ResourceExhausted(#[from] TryReserveError),
}

pub type Result<T> = std::result::Result<T, Error>;
