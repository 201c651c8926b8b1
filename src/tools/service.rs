// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SERVIÇO DE RELATÓRIOS ANUAIS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Orquestra download → extração → índice → resposta.
//
// Arquivos por (org_no, ano) em `storage_dir`:
//   <org_no>_<ano>.xhtml        documento baixado
//   <org_no>_<ano>_index/       índice persistido
//
// Com o índice já gravado, nada é baixado de novo.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use super::ToolError;
use crate::bolagsverket::{extract_xhtml, normalize_org_no, BolagsverketClient, CompanyRegistry};
use crate::config::{AppConfig, ConfigError, IndexConfig};
use crate::extract::StructuralTextExtractor;
use crate::index::{QueryEngine, ReportIndex};
use crate::llm::{LlmClient, OpenAiClient};
use crate::markup::{MarkupDocument, ParseOptions};

/// Caminhos de armazenamento de um relatório.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub xhtml: PathBuf,
    pub index_dir: PathBuf,
}

impl ReportPaths {
    pub fn new(storage_dir: &Path, org_no: &str, year: i32) -> Self {
        Self {
            xhtml: storage_dir.join(format!("{}_{}.xhtml", org_no, year)),
            index_dir: storage_dir.join(format!("{}_{}_index", org_no, year)),
        }
    }
}

/// Serviço compartilhado pelas ferramentas.
///
/// Registro e LLM ficam como `Result`: a falta de credencial só vira erro
/// quando uma ferramenta precisa deles.
pub struct ReportService {
    storage_dir: PathBuf,
    registry: Result<Arc<dyn CompanyRegistry>, ConfigError>,
    llm: Result<Arc<dyn LlmClient>, ConfigError>,
    index_config: IndexConfig,
    parse_options: ParseOptions,
    extractor: StructuralTextExtractor,
}

impl ReportService {
    pub fn new(
        storage_dir: impl Into<PathBuf>,
        registry: Result<Arc<dyn CompanyRegistry>, ConfigError>,
        llm: Result<Arc<dyn LlmClient>, ConfigError>,
        index_config: IndexConfig,
    ) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            registry,
            llm,
            index_config,
            parse_options: ParseOptions::default(),
            extractor: StructuralTextExtractor::new(),
        }
    }

    /// Cria o serviço com os clientes reais (Bolagsverket + OpenAI).
    pub fn from_config(config: &AppConfig) -> Self {
        let registry = BolagsverketClient::from_config(&config.bolagsverket)
            .map(|client| Arc::new(client) as Arc<dyn CompanyRegistry>);

        let llm = OpenAiClient::from_config(&config.llm)
            .map(|client| Arc::new(client) as Arc<dyn LlmClient>)
            .map_err(|_| ConfigError::Missing("OPENAI_API_KEY"));

        let mut service = Self::new(config.storage_dir.clone(), registry, llm, config.index.clone());
        service.parse_options = ParseOptions {
            warn_on_recoverable: config.parse_warnings,
        };
        service
    }

    pub fn with_parse_options(mut self, options: ParseOptions) -> Self {
        self.parse_options = options;
        self
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn paths(&self, org_no: &str, year: i32) -> ReportPaths {
        ReportPaths::new(&self.storage_dir, org_no, year)
    }

    fn registry(&self) -> Result<&Arc<dyn CompanyRegistry>, ToolError> {
        self.registry.as_ref().map_err(|e| ToolError::Config(e.clone()))
    }

    fn llm(&self) -> Result<&Arc<dyn LlmClient>, ToolError> {
        self.llm.as_ref().map_err(|e| ToolError::Config(e.clone()))
    }

    /// Dados da organização (JSON bruto).
    pub async fn fetch_organisation(&self, org_no: &str) -> Result<Value, ToolError> {
        Ok(self.registry()?.fetch_organisation(org_no).await?)
    }

    /// Responde uma pergunta sobre a årsredovisning de `(org_no, year)`.
    pub async fn query(&self, org_no: &str, year: i32, question: &str) -> Result<String, ToolError> {
        let org_no = normalize_org_no(org_no)?;
        let llm = self.llm()?.clone();
        let paths = self.paths(&org_no, year);

        let index = if ReportIndex::exists(&paths.index_dir) {
            log::info!("📂 Usando índice existente para {} {}", org_no, year);
            ReportIndex::load(&paths.index_dir)?
        } else {
            self.build_index(&org_no, year, &paths, llm.as_ref()).await?
        };

        let engine = QueryEngine::new(index, llm, self.index_config.top_k);
        Ok(engine.query(question).await?)
    }

    /// Baixa, extrai, renderiza e indexa o relatório.
    async fn build_index(
        &self,
        org_no: &str,
        year: i32,
        paths: &ReportPaths,
        llm: &dyn LlmClient,
    ) -> Result<ReportIndex, ToolError> {
        let zip = self.registry()?.fetch_annual_report(org_no, year).await?;
        let member = extract_xhtml(&zip)?;

        tokio::fs::create_dir_all(&self.storage_dir).await?;
        tokio::fs::write(&paths.xhtml, &member.content).await?;
        log::info!("💾 {} salvo em {}", member.name, paths.xhtml.display());

        let text = self.render_file(&paths.xhtml).await?;
        log::info!("🧾 Texto extraído: {} caracteres", text.chars().count());

        let index = ReportIndex::create(&text, llm, &self.index_config).await?;
        index.persist(&paths.index_dir)?;
        Ok(index)
    }

    /// Faz parse e renderiza um arquivo XHTML fora do runtime async.
    pub async fn render_file(&self, path: &Path) -> Result<String, ToolError> {
        let path = path.to_path_buf();
        let options = self.parse_options;
        let extractor = self.extractor.clone();

        let text = tokio::task::spawn_blocking(move || {
            MarkupDocument::from_path(&path, &options).map(|document| extractor.render(document))
        })
        .await
        .map_err(|e| ToolError::Internal(e.to_string()))??;

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bolagsverket::BolagsverketError;
    use crate::llm::MockLlmClient;
    use async_trait::async_trait;
    use std::io::{Cursor, Write};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const REPORT: &str = r#"<html xmlns="http://www.w3.org/1999/xhtml"><body>
        <p>Bolaget bedriver konsultverksamhet i Uppsala.</p>
        <table><tr><th>Post</th><th>2022</th></tr><tr><td>Nettoomsättning</td><td>8 200</td></tr></table>
    </body></html>"#;

    struct FakeRegistry {
        downloads: AtomicUsize,
    }

    #[async_trait]
    impl CompanyRegistry for FakeRegistry {
        async fn fetch_organisation(&self, org_no: &str) -> Result<Value, BolagsverketError> {
            Ok(serde_json::json!({ "organisationer": [{ "identitet": org_no }] }))
        }

        async fn fetch_annual_report(&self, org_no: &str, year: i32) -> Result<Vec<u8>, BolagsverketError> {
            if year != 2022 {
                return Err(BolagsverketError::NotFound {
                    org_no: org_no.to_string(),
                    year,
                });
            }
            self.downloads.fetch_add(1, Ordering::SeqCst);

            let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
            writer
                .start_file("arsredovisning.xhtml", zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(REPORT.as_bytes()).unwrap();
            Ok(writer.finish().unwrap().into_inner())
        }
    }

    fn service(dir: &Path) -> (ReportService, Arc<FakeRegistry>) {
        let registry = Arc::new(FakeRegistry {
            downloads: AtomicUsize::new(0),
        });
        let service = ReportService::new(
            dir,
            Ok(registry.clone() as Arc<dyn CompanyRegistry>),
            Ok(Arc::new(MockLlmClient::new()) as Arc<dyn LlmClient>),
            IndexConfig::default(),
        );
        (service, registry)
    }

    #[test]
    fn test_paths() {
        let paths = ReportPaths::new(Path::new("/data"), "5568925548", 2022);
        assert_eq!(paths.xhtml, PathBuf::from("/data/5568925548_2022.xhtml"));
        assert_eq!(paths.index_dir, PathBuf::from("/data/5568925548_2022_index"));
    }

    #[tokio::test]
    async fn test_query_builds_then_reuses_index() {
        let dir = tempfile::tempdir().unwrap();
        let (service, registry) = service(dir.path());

        let answer = service.query("556892-5548", 2022, "Var finns bolaget?").await.unwrap();
        assert!(answer.contains("Uppsala"));

        let paths = service.paths("5568925548", 2022);
        assert!(paths.xhtml.is_file());
        assert!(ReportIndex::exists(&paths.index_dir));

        service.query("5568925548", 2022, "Nettoomsättning?").await.unwrap();
        assert_eq!(registry.downloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_query_missing_year() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = service(dir.path());
        let err = service.query("5568925548", 2019, "?").await.unwrap_err();
        assert!(matches!(err, ToolError::Bolagsverket(BolagsverketError::NotFound { year: 2019, .. })));
    }

    #[tokio::test]
    async fn test_missing_credentials_reported_on_use() {
        let dir = tempfile::tempdir().unwrap();
        let service = ReportService::new(
            dir.path(),
            Err(ConfigError::Missing("BV_CLIENT_ID")),
            Err(ConfigError::Missing("OPENAI_API_KEY")),
            IndexConfig::default(),
        );
        let err = service.fetch_organisation("5568925548").await.unwrap_err();
        assert!(matches!(err, ToolError::Config(ConfigError::Missing("BV_CLIENT_ID"))));
    }

    #[tokio::test]
    async fn test_render_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.xhtml");
        std::fs::write(&path, REPORT).unwrap();
        let (service, _) = service(dir.path());

        let text = service.render_file(&path).await.unwrap();
        assert!(text.starts_with("Bolaget bedriver konsultverksamhet i Uppsala."));
        assert!(text.contains("Nettoomsättning | 8 200"));
    }
}
