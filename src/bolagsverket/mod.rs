//! # Bolagsverket – värdefulla datamängder
//!
//! Cliente para a API aberta da Bolagsverket:
//!
//! - [`TokenManager`]: token OAuth2 (client credentials) com cache até expirar
//! - [`BolagsverketClient`]: dados da organização, lista de documentos e
//!   download da årsredovisning (zip)
//! - [`extract_xhtml`]: extrai o membro `.xhtml` do zip
//!
//! ## Fluxo
//!
//! ```text
//! get_token ─► POST /dokumentlista ─► escolhe período do ano ─► GET /dokument/{id} ─► zip
//! ```

mod archive;
mod token;

pub use archive::{extract_xhtml, ArchiveError, XhtmlMember};
pub use token::{AccessToken, TokenManager, TokenProvider, TokenResponse, DEFAULT_EXPIRES_IN_SECS};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{BolagsverketConfig, ConfigError};

/// Erros das chamadas à Bolagsverket.
#[derive(Debug, thiserror::Error)]
pub enum BolagsverketError {
    /// Nenhuma årsredovisning digital para o ano pedido.
    #[error("Inget dokument hittades för år {year} för organisation {org_no}. Det beror på att bolaget inte lämnat in ÅR digitalt.")]
    NotFound {
        /// Número de organização consultado
        org_no: String,
        /// Ano pedido
        year: i32,
    },

    /// Credenciais recusadas (401/403).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resposta HTTP de erro da API.
    #[error("Upstream error ({status}): {body}")]
    Upstream {
        /// Código HTTP
        status: u16,
        /// Corpo da resposta
        body: String,
    },

    /// A requisição excedeu o timeout.
    #[error("Request timed out")]
    Timeout,

    /// Erro de rede/transporte.
    #[error("Network error: {0}")]
    Network(String),

    /// Corpo da resposta com formato inesperado.
    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    /// Número de organização mal formado.
    #[error("Invalid organisation number: {0}")]
    InvalidOrgNumber(String),

    /// Configuração ausente.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<reqwest::Error> for BolagsverketError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BolagsverketError::Timeout
        } else {
            BolagsverketError::Network(err.to_string())
        }
    }
}

/// Converte respostas de erro em [`BolagsverketError`].
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BolagsverketError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    log::warn!("⚠️ Bolagsverket respondeu {}: {}", status, body);

    Err(status_error(status.as_u16(), body))
}

/// Erro correspondente a um status HTTP sem sucesso.
///
/// 404 fica em `Upstream`: `NotFound` é reservado para "nenhum relatório
/// do ano", decidido depois da lista de documentos.
fn status_error(status: u16, body: String) -> BolagsverketError {
    match status {
        401 | 403 => BolagsverketError::Unauthorized(body),
        code => BolagsverketError::Upstream { status: code, body },
    }
}

/// Normaliza um organisationsnummer: remove hífen e espaços e exige 10 ou
/// 12 dígitos.
pub fn normalize_org_no(raw: &str) -> Result<String, BolagsverketError> {
    let digits: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();

    if (digits.len() == 10 || digits.len() == 12) && digits.chars().all(|c| c.is_ascii_digit()) {
        Ok(digits)
    } else {
        Err(BolagsverketError::InvalidOrgNumber(raw.to_string()))
    }
}

/// Entrada da lista de documentos.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEntry {
    /// Identificador para `GET /dokument/{id}`
    #[serde(default)]
    pub dokument_id: Option<String>,
    /// Fim do período de relatório (`YYYY-MM-DD`)
    #[serde(default)]
    pub rapporteringsperiod_tom: Option<String>,
    /// Formato do arquivo
    #[serde(default)]
    pub filformat: Option<String>,
    /// Momento do registro
    #[serde(default)]
    pub registreringstidpunkt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DocumentList {
    #[serde(default)]
    dokument: Vec<DocumentEntry>,
}

/// Primeiro documento cujo período termina no ano dado.
pub fn select_document(entries: &[DocumentEntry], year: i32) -> Option<&DocumentEntry> {
    let prefix = year.to_string();
    entries.iter().find(|entry| {
        entry.dokument_id.as_deref().map_or(false, |id| !id.is_empty())
            && entry
                .rapporteringsperiod_tom
                .as_deref()
                .map_or(false, |period| period.starts_with(&prefix))
    })
}

/// Cliente da API värdefulla datamängder.
pub struct BolagsverketClient {
    http: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
    api_base_url: String,
    timeout: Duration,
}

impl BolagsverketClient {
    /// Cria o cliente com um [`TokenManager`] próprio; exige as credenciais.
    pub fn from_config(config: &BolagsverketConfig) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1) * 6))
            .build()
            .unwrap_or_default();
        let tokens = TokenManager::from_config(http.clone(), config)?;
        Ok(Self::with_token_provider(http, Arc::new(tokens), config))
    }

    /// Cria o cliente com um fornecedor de token customizado.
    pub fn with_token_provider(
        http: reqwest::Client,
        tokens: Arc<dyn TokenProvider>,
        config: &BolagsverketConfig,
    ) -> Self {
        Self {
            http,
            tokens,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base_url, path.trim_start_matches('/'))
    }

    async fn post_json(&self, path: &str, org_no: &str) -> Result<reqwest::Response, BolagsverketError> {
        let token = self.tokens.get_token().await?;
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&token.token)
            .json(&serde_json::json!({ "identitetsbeteckning": org_no }))
            .timeout(self.timeout)
            .send()
            .await?;
        let result = check_status(response).await;
        self.forget_token_on_unauthorized(result).await
    }

    // Token revogado antes de expirar: o próximo pedido busca outro
    async fn forget_token_on_unauthorized<T>(
        &self,
        result: Result<T, BolagsverketError>,
    ) -> Result<T, BolagsverketError> {
        if let Err(BolagsverketError::Unauthorized(_)) = &result {
            log::warn!("🔑 Token recusado; descartando o cache");
            self.tokens.invalidate().await;
        }
        result
    }

    /// Dados básicos da organização (nome, endereço...) como JSON bruto.
    pub async fn fetch_organisation(&self, org_no: &str) -> Result<serde_json::Value, BolagsverketError> {
        let org_no = normalize_org_no(org_no)?;
        log::info!("🏢 Buscando organização {}", org_no);

        let response = self.post_json("organisationer", &org_no).await?;
        response
            .json()
            .await
            .map_err(|e| BolagsverketError::InvalidResponse(format!("organisationer: {}", e)))
    }

    /// Lista de documentos registrados para a organização.
    pub async fn list_documents(&self, org_no: &str) -> Result<Vec<DocumentEntry>, BolagsverketError> {
        let org_no = normalize_org_no(org_no)?;
        let response = self.post_json("dokumentlista", &org_no).await?;
        let list: DocumentList = response
            .json()
            .await
            .map_err(|e| BolagsverketError::InvalidResponse(format!("dokumentlista: {}", e)))?;

        log::debug!("📄 {} documentos para {}", list.dokument.len(), org_no);
        Ok(list.dokument)
    }

    /// Baixa um documento (zip) pelo id.
    pub async fn download_document(&self, dokument_id: &str) -> Result<Vec<u8>, BolagsverketError> {
        let token = self.tokens.get_token().await?;
        let response = self
            .http
            .get(self.url(&format!("dokument/{}", dokument_id)))
            .bearer_auth(&token.token)
            .send()
            .await?;
        let result = check_status(response).await;
        let response = self.forget_token_on_unauthorized(result).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Baixa o zip da årsredovisning do ano dado.
    ///
    /// Retorna [`BolagsverketError::NotFound`] quando nenhum documento tem
    /// período terminando nesse ano.
    pub async fn fetch_annual_report(&self, org_no: &str, year: i32) -> Result<Vec<u8>, BolagsverketError> {
        let entries = self.list_documents(org_no).await?;
        let entry = select_document(&entries, year).ok_or_else(|| BolagsverketError::NotFound {
            org_no: org_no.to_string(),
            year,
        })?;

        // select_document garante que o id existe
        let dokument_id = entry.dokument_id.clone().unwrap_or_default();
        log::info!("📥 Baixando årsredovisning {} ({} {})", dokument_id, org_no, year);
        let bytes = self.download_document(&dokument_id).await?;
        log::info!("📥 {} bytes recebidos", bytes.len());
        Ok(bytes)
    }
}

/// Registro de empresas consultado pelas ferramentas.
#[async_trait]
pub trait CompanyRegistry: Send + Sync {
    /// Dados da organização como JSON bruto.
    async fn fetch_organisation(&self, org_no: &str) -> Result<serde_json::Value, BolagsverketError>;

    /// Zip da årsredovisning do ano dado.
    async fn fetch_annual_report(&self, org_no: &str, year: i32) -> Result<Vec<u8>, BolagsverketError>;
}

#[async_trait]
impl CompanyRegistry for BolagsverketClient {
    async fn fetch_organisation(&self, org_no: &str) -> Result<serde_json::Value, BolagsverketError> {
        BolagsverketClient::fetch_organisation(self, org_no).await
    }

    async fn fetch_annual_report(&self, org_no: &str, year: i32) -> Result<Vec<u8>, BolagsverketError> {
        BolagsverketClient::fetch_annual_report(self, org_no, year).await
    }
}
