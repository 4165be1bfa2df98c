use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("unknown field `{0}`")]
    UnknownField(String),
    #[error("field `{0}` is reserved for the document index")]
    ReservedField(String),
    #[error("invalid scoring method `{code}`: {reason}")]
    InvalidMethod { code: String, reason: String },
    #[error("invalid LSH parameters: {0}")]
    InvalidLshParams(String),
    #[error("empty corpus: {0}")]
    EmptyCorpus(&'static str),
    #[error("degenerate average field length {0}")]
    DegenerateLength(f64),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SearchError {
    /// True for errors caused by caller-supplied configuration rather than data or I/O.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SearchError::UnknownField(_)
                | SearchError::ReservedField(_)
                | SearchError::InvalidMethod { .. }
                | SearchError::InvalidLshParams(_)
        )
    }
}
