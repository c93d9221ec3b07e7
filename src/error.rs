use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Adjudicator error: {0}")]
    Adjudicator(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl From<polars::error::PolarsError> for AnalysisError {
    fn from(e: polars::error::PolarsError) -> Self {
        AnalysisError::Polars(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
