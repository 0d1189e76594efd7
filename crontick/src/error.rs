//! Crate error type.

use crate::parser::ParseError;

/// Errors returned by [`Ticker`](crate::ticker::Ticker) construction and
/// reset. The running timer loop itself has no failure mode; parsing the
/// specification is the only fallible step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The crontab specification could not be parsed. The parser's
    /// diagnostic is preserved verbatim as the cause.
    #[error("failed to parse spec: {0}")]
    Spec(#[from] ParseError),
}

pub type Result<T> = std::result::Result<T, Error>;
