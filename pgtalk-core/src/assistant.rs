//! `SqlAssistant`: ties the training store, the embedding backend and the
//! chat model together.

use std::sync::Arc;

use uuid::Uuid;

use crate::config::RetrievalConfig;
use crate::embeddings::EmbeddingBackend;
use crate::error::Result;
use crate::llm::ChatBackend;
use crate::prompt;
use crate::store::{TrainingKind, TrainingStore};

#[derive(Clone)]
pub struct SqlAssistant {
    store: Arc<dyn TrainingStore>,
    embedder: Arc<dyn EmbeddingBackend>,
    chat: Arc<dyn ChatBackend>,
    retrieval: RetrievalConfig,
}

impl SqlAssistant {
    pub fn new(
        store: Arc<dyn TrainingStore>,
        embedder: Arc<dyn EmbeddingBackend>,
        chat: Arc<dyn ChatBackend>,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            chat,
            retrieval,
        }
    }

    pub fn store(&self) -> &Arc<dyn TrainingStore> {
        &self.store
    }

    pub async fn train_ddl(&self, ddl: &str) -> Result<Uuid> {
        let embedding = self.embedder.embed(ddl).await?;
        self.store.add(TrainingKind::Ddl, None, ddl, embedding).await
    }

    pub async fn train_documentation(&self, text: &str) -> Result<Uuid> {
        let embedding = self.embedder.embed(text).await?;
        self.store
            .add(TrainingKind::Documentation, None, text, embedding)
            .await
    }

    /// Question/SQL pairs are embedded as the question followed by the SQL
    /// so either half can match a later question.
    pub async fn train_sql(&self, question: &str, sql: &str) -> Result<Uuid> {
        let embedding = self.embedder.embed(&format!("{question}\n{sql}")).await?;
        self.store
            .add(TrainingKind::Sql, Some(question), sql, embedding)
            .await
    }

    /// Ask the model for SQL answering `question`. `Ok(None)` means the model
    /// answered without a query.
    pub async fn generate_sql(&self, question: &str) -> Result<Option<String>> {
        let embedding = self.embedder.embed(question).await?;

        let ddl = self
            .store
            .similar(TrainingKind::Ddl, &embedding, self.retrieval.n_ddl)
            .await?;
        let docs = self
            .store
            .similar(TrainingKind::Documentation, &embedding, self.retrieval.n_documentation)
            .await?;
        let examples = self
            .store
            .similar(TrainingKind::Sql, &embedding, self.retrieval.n_sql)
            .await?;

        tracing::info!(
            ddl = ddl.len(),
            documentation = docs.len(),
            examples = examples.len(),
            "Retrieved training context"
        );

        let messages = prompt::sql_prompt(
            &self.retrieval.dialect,
            question,
            &ddl,
            &docs,
            &examples,
            self.retrieval.max_prompt_chars,
        );
        let answer = self.chat.complete(&messages).await?;
        let sql = prompt::extract_sql(&answer);

        if sql.is_none() {
            tracing::warn!(answer = %answer, "Model answer contained no SQL");
        }
        Ok(sql)
    }

    pub async fn generate_explanation(&self, sql: &str) -> Result<String> {
        Ok(self.chat.complete(&prompt::explanation_prompt(sql)).await?)
    }

    pub async fn generate_question(&self, sql: &str) -> Result<String> {
        let question = self.chat.complete(&prompt::question_prompt(sql)).await?;
        Ok(question.trim().to_string())
    }
}
