use thiserror::Error;

use crate::embeddings::EmbeddingError;
use crate::llm::LlmError;

#[derive(Error, Debug)]
pub enum PgTalkError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("No SQL could be extracted from the model response")]
    NoSqlGenerated,

    #[error("Only read queries can be executed, got: {0}")]
    ReadOnly(String),

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, PgTalkError>;
