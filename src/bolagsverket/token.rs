// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TOKEN OAUTH2 (CLIENT CREDENTIALS)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Cache de uma única entrada: o token fica guardado até expirar e só então
// um novo é pedido ao endpoint OAuth2.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;

use super::{check_status, BolagsverketError};
use crate::config::{AppConfig, BolagsverketConfig, ConfigError};

/// Validade assumida quando a resposta não traz `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Token de acesso com validade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    /// Bearer token
    pub token: String,
    /// Instante a partir do qual o token não é mais usado
    pub valid_until: DateTime<Utc>,
}

impl AccessToken {
    /// Verifica se o token ainda vale no instante dado.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.token.is_empty() && now < self.valid_until
    }
}

/// Resposta do endpoint de token.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// Token emitido
    pub access_token: String,
    /// Validade em segundos
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl TokenResponse {
    /// Converte em [`AccessToken`] relativo ao instante do pedido.
    pub fn into_access_token(self, requested_at: DateTime<Utc>) -> AccessToken {
        // `expires_in` fora do intervalo de data cai na validade padrão
        let valid_until = self
            .expires_in
            .and_then(ChronoDuration::try_seconds)
            .and_then(|expires_in| requested_at.checked_add_signed(expires_in))
            .unwrap_or_else(|| requested_at + ChronoDuration::seconds(DEFAULT_EXPIRES_IN_SECS));
        AccessToken {
            token: self.access_token,
            valid_until,
        }
    }
}

/// Fornecedor de tokens para as chamadas autenticadas.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Retorna um token válido, renovando se necessário.
    async fn get_token(&self) -> Result<AccessToken, BolagsverketError>;

    /// Descarta o token em cache, se houver (ex: após um 401).
    async fn invalidate(&self) {}
}

/// Gerenciador de token com cache.
pub struct TokenManager {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
    cached: Mutex<Option<AccessToken>>,
}

impl TokenManager {
    /// Cria o gerenciador a partir da configuração; exige as credenciais.
    pub fn from_config(http: reqwest::Client, config: &BolagsverketConfig) -> Result<Self, ConfigError> {
        let client_id = AppConfig::require(&config.client_id, "BV_CLIENT_ID")?.to_string();
        let client_secret = AppConfig::require(&config.client_secret, "BV_CLIENT_SECRET")?.to_string();

        Ok(Self {
            http,
            token_url: config.token_url.clone(),
            client_id,
            client_secret,
            scope: config.scope.clone(),
            cached: Mutex::new(None),
        })
    }

    async fn request_token(&self) -> Result<AccessToken, BolagsverketError> {
        let requested_at = Utc::now();
        log::info!("🔑 Solicitando novo token Bolagsverket");

        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await?;

        let response = check_status(response).await?;
        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| BolagsverketError::InvalidResponse(format!("token: {}", e)))?;

        Ok(body.into_access_token(requested_at))
    }

    #[cfg(test)]
    pub(crate) async fn seed(&self, token: AccessToken) {
        *self.cached.lock().await = Some(token);
    }

    #[cfg(test)]
    pub(crate) async fn cached(&self) -> Option<AccessToken> {
        self.cached.lock().await.clone()
    }
}

#[async_trait]
impl TokenProvider for TokenManager {
    async fn get_token(&self) -> Result<AccessToken, BolagsverketError> {
        // O lock é mantido durante a renovação para não pedir dois tokens
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.is_valid_at(Utc::now()) {
                return Ok(token.clone());
            }
        }

        let token = self.request_token().await?;
        log::debug!("🔑 Token válido até {}", token.valid_until);
        *cached = Some(token.clone());
        Ok(token)
    }

    async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BolagsverketConfig {
        BolagsverketConfig {
            client_id: Some("id".into()),
            client_secret: Some("secret".into()),
            // Porta fechada: qualquer pedido real falha
            token_url: "http://127.0.0.1:9/oauth2/token".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_token_response_default_expiry() {
        let now = Utc::now();
        let body: TokenResponse = serde_json::from_str(r#"{"access_token":"abc"}"#).unwrap();
        let token = body.into_access_token(now);
        assert_eq!(token.valid_until, now + ChronoDuration::seconds(3600));
        assert!(token.is_valid_at(now));
        assert!(!token.is_valid_at(now + ChronoDuration::seconds(3600)));
    }

    #[test]
    fn test_token_response_explicit_expiry() {
        let now = Utc::now();
        let body: TokenResponse =
            serde_json::from_str(r#"{"access_token":"abc","expires_in":60,"token_type":"Bearer"}"#)
                .unwrap();
        assert_eq!(body.into_access_token(now).valid_until, now + ChronoDuration::seconds(60));
    }

    #[test]
    fn test_token_response_out_of_range_expiry() {
        let now = Utc::now();
        for expires_in in [i64::MAX, i64::MIN] {
            let body = TokenResponse {
                access_token: "abc".into(),
                expires_in: Some(expires_in),
            };
            assert_eq!(body.into_access_token(now).valid_until, now + ChronoDuration::seconds(3600));
        }
    }

    #[tokio::test]
    async fn test_invalidate_clears_cache() {
        let manager = TokenManager::from_config(reqwest::Client::new(), &config()).unwrap();
        manager
            .seed(AccessToken {
                token: "revogado".into(),
                valid_until: Utc::now() + ChronoDuration::seconds(600),
            })
            .await;
        TokenProvider::invalidate(&manager).await;
        assert!(manager.cached().await.is_none());
    }

    #[test]
    fn test_missing_credentials() {
        let config = BolagsverketConfig::default();
        let result = TokenManager::from_config(reqwest::Client::new(), &config);
        assert_eq!(result.err(), Some(ConfigError::Missing("BV_CLIENT_ID")));
    }

    #[tokio::test]
    async fn test_cached_token_reused_without_request() {
        let manager = TokenManager::from_config(reqwest::Client::new(), &config()).unwrap();
        let token = AccessToken {
            token: "cached".into(),
            valid_until: Utc::now() + ChronoDuration::seconds(600),
        };
        manager.seed(token.clone()).await;
        assert_eq!(manager.get_token().await.unwrap(), token);
    }

    #[tokio::test]
    async fn test_expired_token_triggers_refresh() {
        let manager = TokenManager::from_config(reqwest::Client::new(), &config()).unwrap();
        manager
            .seed(AccessToken {
                token: "old".into(),
                valid_until: Utc::now() - ChronoDuration::seconds(1),
            })
            .await;
        // O refresh tenta a rede e falha; o token expirado não é devolvido
        assert!(manager.get_token().await.is_err());
    }
}
