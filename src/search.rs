// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// RESOLUÇÃO DE NOME → ORGANISATIONSNUMMER
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Busca web (Tavily) pelo número de organização de uma empresa sueca.
// O resultado bruto volta para o chamador; `candidate_org_numbers` extrai
// os números que aparecem no texto.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::config::{AppConfig, ConfigError};

/// Erros do cliente de busca
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Search API error: {0}")]
    ApiError(String),

    #[error("Rate limit exceeded")]
    RateLimitError,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response format: {0}")]
    ParseError(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        SearchError::NetworkError(err.to_string())
    }
}

/// Pergunta enviada ao buscador para um nome de empresa.
pub fn org_no_query(company_name: &str) -> String {
    format!(
        "Vilket organisationsnummer har den svenska organisationen {}?",
        company_name.trim()
    )
}

static ORG_NO_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{6})-?(\d{4})\b").expect("valid org number regex"));

fn collect_strings<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(text) => out.push(text),
        Value::Array(items) => items.iter().for_each(|item| collect_strings(item, out)),
        Value::Object(map) => map.values().for_each(|item| collect_strings(item, out)),
        _ => {}
    }
}

/// Números de organização (`NNNNNN-NNNN` ou 10 dígitos) encontrados em
/// qualquer string do resultado, normalizados para `NNNNNN-NNNN`, sem
/// repetição e na ordem em que aparecem.
pub fn candidate_org_numbers(result: &Value) -> Vec<String> {
    let mut texts = Vec::new();
    collect_strings(result, &mut texts);

    let mut found: Vec<String> = Vec::new();
    for text in texts {
        for caps in ORG_NO_PATTERN.captures_iter(text) {
            let candidate = format!("{}-{}", &caps[1], &caps[2]);
            if !found.contains(&candidate) {
                found.push(candidate);
            }
        }
    }
    found
}

/// Trait para buscadores de número de organização
#[async_trait]
pub trait NameResolver: Send + Sync {
    /// Executa a busca e devolve a resposta bruta do provedor
    async fn search(&self, query: &str) -> Result<Value, SearchError>;

    /// Busca o número de organização de uma empresa pelo nome
    async fn resolve(&self, company_name: &str) -> Result<Value, SearchError> {
        self.search(&org_no_query(company_name)).await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// IMPLEMENTAÇÃO TAVILY
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Cliente da API de busca Tavily
pub struct TavilyClient {
    api_key: String,
    url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
}

impl TavilyClient {
    pub fn new(api_key: String, url: impl Into<String>) -> Self {
        Self {
            api_key,
            url: url.into(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Cria o cliente a partir da configuração; exige `TAVILY_API_KEY`.
    pub fn from_config(config: &AppConfig) -> Result<Self, SearchError> {
        let api_key = AppConfig::require(&config.tavily_api_key, "TAVILY_API_KEY")?.to_string();
        Ok(Self::new(api_key, config.tavily_url.clone()))
    }
}

#[async_trait]
impl NameResolver for TavilyClient {
    async fn search(&self, query: &str) -> Result<Value, SearchError> {
        log::info!("🔍 Tavily: {}", query);

        let response = self
            .client
            .post(&self.url)
            .json(&TavilyRequest {
                api_key: &self.api_key,
                query,
            })
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(SearchError::RateLimitError);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::ApiError(format!("{}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| SearchError::ParseError(e.to_string()))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// IMPLEMENTAÇÃO MOCK PARA TESTES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Resolver mock: devolve uma resposta fixa (ou erro) e guarda as queries.
#[derive(Debug, Default)]
pub struct MockNameResolver {
    response: Option<Value>,
    pub queries: Mutex<Vec<String>>,
}

impl MockNameResolver {
    /// Mock que responde sempre com `response`.
    pub fn new(response: Value) -> Self {
        Self {
            response: Some(response),
            queries: Mutex::default(),
        }
    }

    /// Mock que falha em toda busca.
    pub fn failing() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NameResolver for MockNameResolver {
    async fn search(&self, query: &str) -> Result<Value, SearchError> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.to_string());
        }
        self.response
            .clone()
            .ok_or_else(|| SearchError::ApiError("mock failure".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_org_no_query() {
        assert_eq!(
            org_no_query(" Volvo Cars AB "),
            "Vilket organisationsnummer har den svenska organisationen Volvo Cars AB?"
        );
    }

    #[test]
    fn test_candidate_org_numbers() {
        let result = json!({
            "query": "x",
            "results": [
                {"title": "Volvo Car AB (publ)", "content": "Org.nr 556810-8988, säte Göteborg"},
                {"content": "Organisationsnummer: 5568108988. Telefon 031-590000"},
                {"content": "Dotterbolag 5560742213"}
            ]
        });
        assert_eq!(
            candidate_org_numbers(&result),
            vec!["556810-8988".to_string(), "556074-2213".to_string()]
        );
    }

    #[test]
    fn test_candidate_org_numbers_ignores_longer_digit_runs() {
        let result = json!({"content": "Tel 0046315900001 och år 2022"});
        assert!(candidate_org_numbers(&result).is_empty());
    }

    #[tokio::test]
    async fn test_mock_resolver_uses_swedish_query() {
        let resolver = MockNameResolver::new(json!({"results": []}));
        let value = resolver.resolve("Spotify AB").await.unwrap();
        assert_eq!(value, json!({"results": []}));
        assert_eq!(
            *resolver.queries.lock().unwrap(),
            vec![org_no_query("Spotify AB")]
        );
    }

    #[test]
    fn test_tavily_requires_key() {
        let result = TavilyClient::from_config(&AppConfig::default());
        assert!(matches!(result, Err(SearchError::Config(_))));
    }

    #[tokio::test]
    #[ignore] // Requer TAVILY_API_KEY
    async fn test_tavily_search() {
        let key = std::env::var("TAVILY_API_KEY").unwrap();
        let client = TavilyClient::new(key, "https://api.tavily.com/search");
        let result = client.resolve("Volvo Cars AB").await.unwrap();
        assert!(result.get("results").is_some());
    }
}
