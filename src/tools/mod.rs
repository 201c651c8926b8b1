//! # Ferramentas MCP
//!
//! As três ferramentas expostas ao assistente:
//!
//! | Ferramenta | Entrada | Saída |
//! |------------|---------|-------|
//! | `query_annual_report` | `org_no`, `year`, `query` | resposta em texto |
//! | `fetch_org_data` | `org_no` | JSON bruto da Bolagsverket |
//! | `get_org_no` | `company_name` | JSON bruto da busca, ou `null` |
//!
//! Todas implementam [`McpTool`] e ficam num [`ToolRegistry`].

mod annual_report;
mod service;

pub use annual_report::{annual_report_tools, FetchOrgDataTool, GetOrgNoTool, QueryAnnualReportTool};
pub use service::{ReportPaths, ReportService};

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::bolagsverket::{ArchiveError, BolagsverketError};
use crate::config::ConfigError;
use crate::index::IndexError;
use crate::markup::MarkupError;
use crate::search::SearchError;

/// Erros das ferramentas.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error(transparent)]
    Bolagsverket(#[from] BolagsverketError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("Failed to parse XHTML: {0}")]
    Markup(#[from] MarkupError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ToolError {
    /// Erros de parâmetro viram `-32602` no protocolo; o resto vira
    /// resultado com `isError`.
    pub fn is_invalid_params(&self) -> bool {
        matches!(self, ToolError::InvalidParams(_))
    }
}

/// Trait para ferramentas chamáveis via `tools/call`.
#[async_trait]
pub trait McpTool: Send + Sync {
    /// Nome da ferramenta.
    fn name(&self) -> &'static str;

    /// Descrição da ferramenta.
    fn description(&self) -> &'static str;

    /// JSON Schema dos argumentos.
    fn input_schema(&self) -> Value;

    /// Executa a ferramenta com os argumentos fornecidos.
    async fn execute(&self, params: Value) -> Result<Value, ToolError>;
}

/// Descrição publicada em `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Ferramentas registradas, na ordem de registro.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn McpTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra uma ferramenta; um nome repetido substitui a anterior.
    pub fn register(&mut self, tool: Arc<dyn McpTool>) {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(pos) => self.tools[pos] = tool,
            None => self.tools.push(tool),
        }
    }

    pub fn with(mut self, tool: Arc<dyn McpTool>) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn McpTool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn list(&self) -> Vec<ToolDescriptor> {
        self.tools
            .iter()
            .map(|tool| ToolDescriptor {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
            })
            .collect()
    }

    /// Executa a ferramenta `name`.
    pub async fn call(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        log::info!("🔧 {} {}", name, args);
        let started = std::time::Instant::now();
        let result = tool.execute(args).await;
        match &result {
            Ok(_) => log::info!("✅ {} concluída em {:?}", name, started.elapsed()),
            Err(e) => log::warn!("⚠️ {} falhou: {}", name, e),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool(&'static str);

    #[async_trait]
    impl McpTool for EchoTool {
        fn name(&self) -> &'static str {
            self.0
        }

        fn description(&self) -> &'static str {
            "Devolve os argumentos"
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(&self, params: Value) -> Result<Value, ToolError> {
            Ok(params)
        }
    }

    #[tokio::test]
    async fn test_registry_call_and_unknown() {
        let registry = ToolRegistry::new().with(Arc::new(EchoTool("echo")));
        assert_eq!(registry.call("echo", json!({"a": 1})).await.unwrap(), json!({"a": 1}));
        assert!(matches!(
            registry.call("missing", json!({})).await,
            Err(ToolError::UnknownTool(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_registry_keeps_order_and_replaces() {
        let registry = ToolRegistry::new()
            .with(Arc::new(EchoTool("b")))
            .with(Arc::new(EchoTool("a")))
            .with(Arc::new(EchoTool("b")));
        assert_eq!(registry.names(), vec!["b", "a"]);
    }

    #[test]
    fn test_descriptor_serializes_camel_case() {
        let registry = ToolRegistry::new().with(Arc::new(EchoTool("echo")));
        let value = serde_json::to_value(registry.list()).unwrap();
        assert_eq!(value[0]["inputSchema"], json!({"type": "object"}));
        assert_eq!(value[0]["name"], "echo");
    }
}
