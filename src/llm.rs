// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CLIENTE LLM
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Trait e implementações para embeddings e respostas em linguagem natural.
// O índice semântico só depende da trait `LlmClient`.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{AppConfig, ConfigError, LlmConfig};

/// Erros do cliente LLM
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limit exceeded")]
    RateLimitError,

    #[error("Invalid response format: {0}")]
    ParseError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::NetworkError(err.to_string())
    }
}

/// Trait principal para clientes LLM
///
/// Permite trocar o provedor (OpenAI, compatíveis, mock) sem tocar no índice.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Nome do modelo de embeddings (gravado no índice persistido)
    fn embedding_model(&self) -> &str;

    /// Gera embeddings em batch, na mesma ordem dos textos
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;

    /// Gera embedding para um texto
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ParseError("empty embedding response".into()))
    }

    /// Resposta de chat para um par system/user
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// IMPLEMENTAÇÃO OPENAI
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Cliente para a API OpenAI (ou compatível)
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    model: String,
    embedding_model: String,
    temperature: f32,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(api_key: String) -> Self {
        Self::with_config(api_key, &LlmConfig::default())
    }

    fn with_config(api_key: String, config: &LlmConfig) -> Self {
        Self {
            api_key,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            embedding_model: config.embedding_model.clone(),
            temperature: config.temperature,
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Cria o cliente a partir da configuração; exige `OPENAI_API_KEY`.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = AppConfig::require(&config.api_key, "OPENAI_API_KEY")?.to_string();
        Ok(Self::with_config(api_key, config))
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.into();
        self
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<reqwest::Response, LlmError> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(LlmError::RateLimitError);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError(format!("{}: {}", status, error_text)));
        }
        Ok(response)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: texts,
        };
        let response: EmbeddingResponse = self
            .post("embeddings", &request)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        let mut data = response.data;
        if data.len() != texts.len() {
            return Err(LlmError::ParseError(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                data.len()
            )));
        }
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
        };

        let response: ChatResponse = self
            .post("chat/completions", &request)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::ParseError("no choices in chat response".into()))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// IMPLEMENTAÇÃO MOCK PARA TESTES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Dimensão dos embeddings do mock.
pub const MOCK_EMBEDDING_DIM: usize = 256;

/// Cliente mock determinístico.
///
/// Embeddings são um bag-of-words com hash (palavras iguais → vetores
/// próximos); `complete` devolve o prompt do usuário e o guarda em
/// `prompts` para inspeção.
#[derive(Debug, Default)]
pub struct MockLlmClient {
    pub prompts: Mutex<Vec<String>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Embedding determinístico de um texto.
    pub fn embed_text(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; MOCK_EMBEDDING_DIM];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let slot = fnv1a(&word.to_lowercase()) as usize % MOCK_EMBEDDING_DIM;
            vector[slot] += 1.0;
        }
        vector
    }
}

fn fnv1a(text: &str) -> u64 {
    text.bytes().fold(0xcbf2_9ce4_8422_2325u64, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn embedding_model(&self) -> &str {
        "mock-bow"
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        Ok(texts.iter().map(|t| Self::embed_text(t)).collect())
    }

    async fn complete(&self, _system: &str, user: &str) -> Result<String, LlmError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(user.to_string());
        }
        Ok(user.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_embeddings_are_deterministic() {
        let client = MockLlmClient::new();
        let a = client.embed("Nettoomsättning 2022").await.unwrap();
        let b = client.embed("nettoomsättning 2022").await.unwrap();
        assert_eq!(a.len(), MOCK_EMBEDDING_DIM);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_mock_complete_records_prompt() {
        let client = MockLlmClient::new();
        let answer = client.complete("system", "fråga").await.unwrap();
        assert_eq!(answer, "fråga");
        assert_eq!(*client.prompts.lock().unwrap(), vec!["fråga".to_string()]);
    }

    #[test]
    fn test_openai_requires_key() {
        let result = OpenAiClient::from_config(&LlmConfig::default());
        assert!(matches!(result, Err(LlmError::Config(ConfigError::Missing("OPENAI_API_KEY")))));
    }

    #[test]
    fn test_embedding_response_parsing() {
        let json = r#"{"data":[{"index":1,"embedding":[0.5]},{"index":0,"embedding":[0.25]}],"model":"x"}"#;
        let response: EmbeddingResponse = serde_json::from_str(json).unwrap();
        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        assert_eq!(data[0].embedding, vec![0.25]);
    }

    #[tokio::test]
    #[ignore] // Requer OPENAI_API_KEY
    async fn test_openai_embed() {
        let key = std::env::var("OPENAI_API_KEY").unwrap();
        let client = OpenAiClient::new(key);
        let vector = client.embed("Årsredovisning").await.unwrap();
        assert!(!vector.is_empty());
    }
}
