//! # Índice semântico do relatório
//!
//! Texto renderizado → chunks → embeddings → `index.json`.
//!
//! ```text
//! render ─► chunk_sections ─► LlmClient::embed_batch ─► ReportIndex::persist
//!                                                          │
//! pergunta ─► embed ─► top-k (cosseno) ─► LlmClient::complete ─► resposta
//! ```

mod chunk;
mod similarity;
mod store;

pub use chunk::{chunk_sections, ChunkOptions};
pub use similarity::{cosine_similarity, top_k_similar};
pub use store::{IndexedChunk, ReportIndex, ScoredChunk, INDEX_FILE_NAME, INDEX_FORMAT_VERSION};

use std::path::PathBuf;
use std::sync::Arc;

use crate::llm::{LlmClient, LlmError};

/// Instrução de idioma enviada em toda pergunta.
pub const SWEDISH_ANSWER_INSTRUCTION: &str = "Säkerställ att svaret är på svenska.";

const SYSTEM_PROMPT: &str = "Du är en assistent som besvarar frågor om svenska årsredovisningar. \
Använd endast informationen i den givna kontexten. \
Om svaret inte finns i kontexten, säg att du inte vet.";

/// Erros do índice.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Document produced no text to index")]
    EmptyDocument,

    #[error("Index not found in {0}")]
    NotFound(PathBuf),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Responde perguntas sobre um [`ReportIndex`].
pub struct QueryEngine {
    index: ReportIndex,
    llm: Arc<dyn LlmClient>,
    top_k: usize,
}

impl QueryEngine {
    pub fn new(index: ReportIndex, llm: Arc<dyn LlmClient>, top_k: usize) -> Self {
        Self {
            index,
            llm,
            top_k: top_k.max(1),
        }
    }

    pub fn index(&self) -> &ReportIndex {
        &self.index
    }

    /// Monta o prompt do usuário com os trechos recuperados.
    pub fn build_prompt(question: &str, context: &[ScoredChunk<'_>]) -> String {
        let context = context
            .iter()
            .map(|chunk| chunk.text)
            .collect::<Vec<_>>()
            .join("\n\n---\n\n");

        format!(
            "Kontext:\n{}\n\nFråga: {}\n\n{}",
            context, question, SWEDISH_ANSWER_INSTRUCTION
        )
    }

    /// Embeda a pergunta, recupera os `top_k` chunks e pede a resposta.
    pub async fn query(&self, question: &str) -> Result<String, IndexError> {
        let query_embedding = self.llm.embed(question).await?;
        let hits = self.index.search(&query_embedding, self.top_k)?;

        log::info!(
            "🔎 {} trechos recuperados (melhor score {:.3})",
            hits.len(),
            hits.first().map_or(0.0, |h| h.score)
        );

        let prompt = Self::build_prompt(question, &hits);
        let answer = self.llm.complete(SYSTEM_PROMPT, &prompt).await?;
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use crate::llm::MockLlmClient;

    #[tokio::test]
    async fn test_query_sends_context_and_swedish_instruction() {
        let llm = Arc::new(MockLlmClient::new());
        let text = "Resultatet efter finansiella poster blev 3 450 tkr.\n\nBolaget har sitt säte i Göteborg.";
        let config = IndexConfig {
            max_chunk_chars: 60,
            ..Default::default()
        };
        let index = ReportIndex::create(text, llm.as_ref(), &config).await.unwrap();

        let engine = QueryEngine::new(index, llm.clone(), 1);
        let answer = engine.query("Var har bolaget sitt säte?").await.unwrap();

        assert!(answer.contains("Göteborg"));
        assert!(!answer.contains("3 450"));
        assert!(answer.ends_with(SWEDISH_ANSWER_INSTRUCTION));
        assert_eq!(llm.prompts.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_build_prompt_without_context() {
        let prompt = QueryEngine::build_prompt("Vad?", &[]);
        assert!(prompt.contains("Fråga: Vad?"));
    }
}
