//! Error types for universe, sub-set and builder operations.

use thiserror::Error;

/// Contract violations reported by the builders.
///
/// Lookups of elements outside a universe are not errors; they return `None`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The element is not a member of the universe where membership is required.
    #[error("element is not a member of the universe")]
    InvalidElement,

    /// An announcement or `add` broke the round protocol.
    #[error("out of protocol order: {0}")]
    OutOfProtocolOrder(&'static str),

    /// The completion token was issued by a different builder.
    #[error("completion token was issued by a different builder")]
    WrongCompletionToken,

    /// The builder has already been finalized.
    #[error("builder already finalized")]
    BuilderAlreadyFinalized,

    /// The sub-set builder handle was issued by a different builder.
    #[error("sub-set builder handle was issued by a different builder")]
    ForeignSubsetBuilder,
}

/// A specialized Result type for builder operations.
pub type Result<T> = std::result::Result<T, Error>;
