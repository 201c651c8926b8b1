// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ÍNDICE PERSISTENTE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Chunks + embeddings de um relatório, gravados em `<dir>/index.json`.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::chunk::{chunk_sections, ChunkOptions};
use super::similarity::top_k_similar;
use super::IndexError;
use crate::config::IndexConfig;
use crate::llm::LlmClient;

/// Nome do arquivo dentro do diretório do índice.
pub const INDEX_FILE_NAME: &str = "index.json";

/// Versão do formato gravado.
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// Chunk com seu embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub text: String,
    pub embedding: Vec<f32>,
}

impl AsRef<[f32]> for IndexedChunk {
    fn as_ref(&self) -> &[f32] {
        &self.embedding
    }
}

/// Chunk recuperado por uma busca.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk<'a> {
    pub position: usize,
    pub score: f32,
    pub text: &'a str,
}

/// Índice vetorial de um relatório anual.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportIndex {
    pub version: u32,
    pub embedding_model: String,
    pub created_at: DateTime<Utc>,
    pub chunks: Vec<IndexedChunk>,
}

impl ReportIndex {
    /// Divide o texto em chunks e gera os embeddings em lotes.
    pub async fn create(text: &str, llm: &dyn LlmClient, config: &IndexConfig) -> Result<Self, IndexError> {
        let texts = chunk_sections(text, &ChunkOptions::with_max_chars(config.max_chunk_chars));
        if texts.is_empty() {
            return Err(IndexError::EmptyDocument);
        }

        log::info!("🧩 {} chunks para indexar", texts.len());

        let mut chunks = Vec::with_capacity(texts.len());
        for batch in texts.chunks(config.embed_batch_size.max(1)) {
            let embeddings = llm.embed_batch(batch).await?;
            if embeddings.len() != batch.len() {
                return Err(IndexError::DimensionMismatch {
                    expected: batch.len(),
                    actual: embeddings.len(),
                });
            }
            chunks.extend(
                batch
                    .iter()
                    .cloned()
                    .zip(embeddings)
                    .map(|(text, embedding)| IndexedChunk { text, embedding }),
            );
        }

        Ok(Self {
            version: INDEX_FORMAT_VERSION,
            embedding_model: llm.embedding_model().to_string(),
            created_at: Utc::now(),
            chunks,
        })
    }

    /// Caminho do arquivo do índice dentro de `dir`.
    pub fn file_path(dir: &Path) -> PathBuf {
        dir.join(INDEX_FILE_NAME)
    }

    /// Verifica se já existe um índice gravado em `dir`.
    pub fn exists(dir: &Path) -> bool {
        Self::file_path(dir).is_file()
    }

    /// Grava o índice em `dir/index.json` (cria o diretório).
    pub fn persist(&self, dir: &Path) -> Result<(), IndexError> {
        std::fs::create_dir_all(dir)?;
        let json = serde_json::to_vec(self)?;
        std::fs::write(Self::file_path(dir), json)?;
        log::info!("💾 Índice gravado em {}", dir.display());
        Ok(())
    }

    /// Carrega um índice gravado.
    pub fn load(dir: &Path) -> Result<Self, IndexError> {
        let path = Self::file_path(dir);
        if !path.is_file() {
            return Err(IndexError::NotFound(dir.to_path_buf()));
        }
        let bytes = std::fs::read(&path)?;
        let index: Self = serde_json::from_slice(&bytes)?;
        log::debug!("📂 Índice carregado: {} chunks", index.chunks.len());
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Os `top_k` chunks mais próximos do embedding da pergunta.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<ScoredChunk<'_>>, IndexError> {
        if let Some(first) = self.chunks.first() {
            if first.embedding.len() != query.len() {
                return Err(IndexError::DimensionMismatch {
                    expected: first.embedding.len(),
                    actual: query.len(),
                });
            }
        }

        Ok(top_k_similar(query, &self.chunks, top_k)
            .into_iter()
            .map(|(position, score)| ScoredChunk {
                position,
                score,
                text: &self.chunks[position].text,
            })
            .collect())
    }
}
