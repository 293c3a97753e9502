use crate::agent::ParseFailure;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InsightError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Invocation error: {0}")]
    Invocation(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("{0}")]
    OutputParse(ParseFailure),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, InsightError>;
