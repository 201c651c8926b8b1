// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CONFIGURAÇÃO DO RUNTIME E DOS SERVIÇOS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Configurações para o runtime Tokio, Bolagsverket, LLM, índice e Tavily.
// Todas as configurações podem ser definidas via .env
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::path::PathBuf;
use std::str::FromStr;

/// Erros de configuração.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Variável obrigatória ausente.
    #[error("Missing configuration: {0} não definida")]
    Missing(&'static str),
}

/// Configuração do runtime Tokio.
///
/// Controla número de threads e comportamento do async runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Número de worker threads do Tokio.
    /// Se None, usa cálculo dinâmico: min(cpu_cores, max_threads).
    pub worker_threads: Option<usize>,

    /// Número máximo de threads (limite superior para cálculo dinâmico).
    /// Padrão: 4
    pub max_threads: usize,

    /// Número máximo de blocking threads.
    pub max_blocking_threads: usize,

    /// Nome das threads do runtime.
    pub thread_name: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            max_threads: 4,
            max_blocking_threads: 64,
            thread_name: "annual-report".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Calcula número efetivo de worker threads.
    pub fn effective_worker_threads(&self) -> usize {
        self.worker_threads
            .unwrap_or_else(|| std::cmp::min(num_cpus::get(), self.max_threads))
    }
}

/// Credenciais e endpoints da API Bolagsverket (värdefulla datamängder).
#[derive(Debug, Clone)]
pub struct BolagsverketConfig {
    /// `BV_CLIENT_ID`
    pub client_id: Option<String>,
    /// `BV_CLIENT_SECRET`
    pub client_secret: Option<String>,
    /// Endpoint OAuth2 (client credentials)
    pub token_url: String,
    /// Base da API, sem barra final
    pub api_base_url: String,
    /// Escopos pedidos no token
    pub scope: String,
    /// Timeout das requisições em segundos
    pub timeout_secs: u64,
}

impl Default for BolagsverketConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            token_url: "https://portal.api.bolagsverket.se/oauth2/token".into(),
            api_base_url: "https://gw.api.bolagsverket.se/vardefulla-datamangder/v1".into(),
            scope: "vardefulla-datamangder:read vardefulla-datamangder:ping".into(),
            timeout_secs: 10,
        }
    }
}

/// Configuração do LLM (embeddings + respostas).
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// `OPENAI_API_KEY`
    pub api_key: Option<String>,
    /// Base da API compatível com OpenAI
    pub api_base_url: String,
    /// Modelo de chat
    pub model: String,
    /// Modelo de embeddings
    pub embedding_model: String,
    /// Temperatura das respostas
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4.1-mini".into(),
            embedding_model: "text-embedding-3-small".into(),
            temperature: 0.1,
        }
    }
}

/// Parâmetros do índice semântico.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexConfig {
    /// Quantos chunks entram no contexto da resposta
    pub top_k: usize,
    /// Tamanho máximo de um chunk em caracteres
    pub max_chunk_chars: usize,
    /// Tamanho do lote de embeddings
    pub embed_batch_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            max_chunk_chars: 2000,
            embed_batch_size: 64,
        }
    }
}

/// Configuração completa do serviço.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Onde ficam os `.xhtml` baixados e os índices persistidos
    pub storage_dir: PathBuf,
    /// Bolagsverket
    pub bolagsverket: BolagsverketConfig,
    /// LLM
    pub llm: LlmConfig,
    /// Índice
    pub index: IndexConfig,
    /// `TAVILY_API_KEY`
    pub tavily_api_key: Option<String>,
    /// Endpoint de busca do Tavily
    pub tavily_url: String,
    /// Loga problemas recuperáveis no parse do XHTML
    pub parse_warnings: bool,
    /// Runtime Tokio
    pub runtime: RuntimeConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            bolagsverket: BolagsverketConfig::default(),
            llm: LlmConfig::default(),
            index: IndexConfig::default(),
            tavily_api_key: None,
            tavily_url: "https://api.tavily.com/search".into(),
            parse_warnings: false,
            runtime: RuntimeConfig::default(),
        }
    }
}

impl AppConfig {
    /// Exige uma credencial opcional, com erro nomeando a variável.
    pub fn require<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str, ConfigError> {
        value
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(name))
    }
}

/// Diretório padrão: `<data_dir>/Annual Reports Data`.
pub fn default_storage_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Annual Reports Data")
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = env_string(name)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("⚠️ {}={} inválido, usando padrão", name, raw);
            None
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    env_string(name).map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

/// Carrega a configuração a partir das variáveis de ambiente.
///
/// Variáveis suportadas:
/// - `BV_CLIENT_ID`, `BV_CLIENT_SECRET`: credenciais Bolagsverket
/// - `BV_TOKEN_URL`, `BV_API_BASE_URL`: endpoints (opcional)
/// - `TAVILY_API_KEY`: busca de número de organização
/// - `OPENAI_API_KEY`, `LLM_API_BASE_URL`, `LLM_MODEL`, `LLM_EMBEDDING_MODEL`
/// - `ANNUAL_REPORT_STORAGE_DIR`: diretório de armazenamento
/// - `INDEX_TOP_K`, `INDEX_MAX_CHUNK_CHARS`: parâmetros do índice
/// - `HTTP_TIMEOUT_SECS`: timeout das chamadas à Bolagsverket
/// - `XML_PARSE_WARNINGS`: loga problemas recuperáveis do parser
/// - `TOKIO_THREADS`: número fixo de threads
pub fn load_app_config() -> AppConfig {
    let mut config = AppConfig::default();

    if let Some(dir) = env_string("ANNUAL_REPORT_STORAGE_DIR") {
        config.storage_dir = PathBuf::from(dir);
    }
    log::info!("📦 Storage: {}", config.storage_dir.display());

    let bv = &mut config.bolagsverket;
    bv.client_id = env_string("BV_CLIENT_ID");
    bv.client_secret = env_string("BV_CLIENT_SECRET");
    if let Some(url) = env_string("BV_TOKEN_URL") {
        bv.token_url = url;
    }
    if let Some(url) = env_string("BV_API_BASE_URL") {
        bv.api_base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(secs) = env_parse::<u64>("HTTP_TIMEOUT_SECS").filter(|s| *s > 0) {
        bv.timeout_secs = secs;
    }

    let llm = &mut config.llm;
    llm.api_key = env_string("OPENAI_API_KEY");
    if let Some(url) = env_string("LLM_API_BASE_URL") {
        llm.api_base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(model) = env_string("LLM_MODEL") {
        llm.model = model;
    }
    if let Some(model) = env_string("LLM_EMBEDDING_MODEL") {
        llm.embedding_model = model;
    }
    if let Some(temperature) = env_parse::<f32>("LLM_TEMPERATURE") {
        llm.temperature = temperature;
    }
    log::info!("📦 LLM: {} / {}", llm.model, llm.embedding_model);

    if let Some(top_k) = env_parse::<usize>("INDEX_TOP_K").filter(|k| *k > 0) {
        config.index.top_k = top_k;
    }
    if let Some(chars) = env_parse::<usize>("INDEX_MAX_CHUNK_CHARS").filter(|c| *c >= 200) {
        config.index.max_chunk_chars = chars;
    }

    config.tavily_api_key = env_string("TAVILY_API_KEY");
    config.parse_warnings = env_flag("XML_PARSE_WARNINGS").unwrap_or(false);

    if let Some(threads) = env_parse::<usize>("TOKIO_THREADS").filter(|t| *t > 0) {
        config.runtime.worker_threads = Some(threads);
        log::info!("📦 TOKIO_THREADS={} (fixo)", threads);
    }

    for (name, present) in [
        ("BV_CLIENT_ID", config.bolagsverket.client_id.is_some()),
        ("BV_CLIENT_SECRET", config.bolagsverket.client_secret.is_some()),
        ("OPENAI_API_KEY", config.llm.api_key.is_some()),
        ("TAVILY_API_KEY", config.tavily_api_key.is_some()),
    ] {
        if !present {
            log::warn!("⚠️ {} não definida; ferramentas que dependem dela vão falhar", name);
        }
    }

    config
}

/// Instala panic hook que loga via `log` (stdout é o canal MCP).
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("unnamed");

        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_else(|| "unknown location".to_string());

        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic payload".to_string()
        };

        log::error!("[PANIC] Thread {} at {}: {}", thread_name, location, message);
    }));
}

/// Cria o runtime Tokio com configuração customizada.
pub fn create_tokio_runtime(config: &RuntimeConfig) -> std::io::Result<tokio::runtime::Runtime> {
    let worker_threads = config.effective_worker_threads();

    log::info!(
        "🚀 Criando runtime Tokio: {} workers, {} blocking max",
        worker_threads,
        config.max_blocking_threads
    );

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .max_blocking_threads(config.max_blocking_threads)
        .thread_name(&config.thread_name)
        .enable_all()
        .build()
}
