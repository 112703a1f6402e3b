use thiserror::Error;

/// Canonical result for core and every crate built on it.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A required argument (query, provider, rewriter) was not supplied.
    #[error("argument '{0}' must be present")]
    MissingArgument(&'static str),

    /// Member access through an absent value. This is the fault the
    /// null-safe rewrite exists to prevent.
    #[error("null reference while reading member '{member}'")]
    NullReference { member: String },

    #[error("type '{ty}' has no member '{member}'")]
    UnknownMember { ty: String, member: String },

    #[error("unbound parameter '{0}'")]
    UnboundParameter(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("query is not ordered; order it before adding secondary orderings")]
    NotOrdered,

    #[error("unsupported expression: {0}")]
    Unsupported(String),

    #[error("sequence contains no elements")]
    Empty,

    #[error("expression nesting exceeds the evaluation limit of {0}")]
    DepthExceeded(usize),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Hashing error: {0}")]
    Hash(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Hash(e.to_string())
    }
}
