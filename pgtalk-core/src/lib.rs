pub mod assistant;
pub mod config;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod llm;
pub mod prompt;
pub mod query;
pub mod schema;
pub mod sqlfile;
pub mod store;

pub use assistant::SqlAssistant;
pub use config::PgTalkConfig;
pub use embeddings::{EmbeddingBackend, EmbeddingConfig, EmbeddingError, OpenAiEmbeddingClient, OPENAI_DIMENSIONS};
pub use error::PgTalkError;
pub use llm::{ChatBackend, ChatMessage, LlmError, OpenAiChatClient};
pub use query::QueryResult;
pub use store::{MemoryStore, PgVectorStore, TrainingEntry, TrainingKind, TrainingStore};

use std::sync::Arc;
use sqlx::PgPool;

/// Wire up the production assistant: pgvector store in `pool`, OpenAI for
/// embeddings and chat.
pub fn openai_assistant(pool: PgPool, config: &PgTalkConfig) -> Result<SqlAssistant, PgTalkError> {
    let embedder = OpenAiEmbeddingClient::with_base_url(
        EmbeddingConfig::from_app_config(config),
        config.llm.base_url.clone(),
    )?;
    let chat = OpenAiChatClient::new(config.llm.clone())?;

    tracing::info!(
        chat_model = %config.llm.model,
        embedding_model = %config.embedding.model,
        "Initialised OpenAI-backed assistant"
    );

    Ok(SqlAssistant::new(
        Arc::new(PgVectorStore::new(pool)),
        Arc::new(embedder),
        Arc::new(chat),
        config.retrieval.clone(),
    ))
}
