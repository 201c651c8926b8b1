//! # Annual Report MCP
//!
//! Servidor MCP que responde perguntas sobre årsredovisningar (relatórios
//! anuais) de empresas suecas entregues digitalmente à Bolagsverket.
//!
//! ## Fluxo de uma pergunta
//!
//! ```text
//! query_annual_report(org_no, year, query)
//!   ├─ índice já gravado? ── sim ─► carrega <org_no>_<year>_index/
//!   └─ não:
//!        Bolagsverket ─► zip ─► .xhtml ─► MarkupDocument
//!          ─► StructuralTextExtractor::render ─► chunks + embeddings
//!          ─► grava índice
//!   ─► top-k por cosseno ─► LLM responde (em sueco)
//! ```
//!
//! ## Módulos
//!
//! - [`markup`]: árvore XHTML + parse com `quick-xml`
//! - [`extract`]: texto estruturado (parágrafos, listas, tabelas, blocos financeiros)
//! - [`bolagsverket`]: token OAuth2, lista/download de documentos, zip
//! - [`index`]: chunking, embeddings, índice persistente e perguntas
//! - [`llm`]: trait `LlmClient` (OpenAI + mock)
//! - [`search`]: busca de organisationsnummer (Tavily)
//! - [`tools`]: as três ferramentas MCP
//! - [`mcp`]: JSON-RPC 2.0 em stdio
//! - [`config`]: configuração via ambiente
//!
//! ## Exemplo de Uso
//!
//! ```rust,ignore
//! use annual_report::prelude::*;
//!
//! let doc = MarkupDocument::from_path("5568925548_2022.xhtml", &ParseOptions::default())?;
//! let text = StructuralTextExtractor::new().render(doc);
//! println!("{}", text);
//! ```

#![warn(rust_2018_idioms)]

/// Configuração do runtime e dos serviços externos.
pub mod config;

/// Árvore de elementos XHTML e parse.
pub mod markup;

/// Extração de texto estruturado de relatórios XHTML.
///
/// O coração do sistema: [`extract::StructuralTextExtractor`].
pub mod extract;

/// Cliente da API värdefulla datamängder da Bolagsverket.
pub mod bolagsverket;

/// Clientes para Large Language Models (embeddings e chat).
pub mod llm;

/// Índice semântico persistente.
pub mod index;

/// Resolução de nome de empresa para organisationsnummer.
pub mod search;

/// Ferramentas expostas via MCP.
pub mod tools;

/// Servidor MCP (JSON-RPC 2.0 em stdio).
pub mod mcp;

// Re-exports principais
pub use config::{create_tokio_runtime, install_panic_hook, load_app_config, AppConfig, RuntimeConfig};
pub use extract::StructuralTextExtractor;
pub use markup::{MarkupDocument, ParseOptions};
pub use mcp::McpServer;
pub use tools::{annual_report_tools, ReportService, ToolRegistry};

/// Versão do crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude com os tipos mais usados
pub mod prelude {
    pub use crate::bolagsverket::{BolagsverketClient, CompanyRegistry, TokenManager, TokenProvider};
    pub use crate::config::{AppConfig, IndexConfig};
    pub use crate::extract::{table_to_records, StructuralTextExtractor, TableRender, TableRow};
    pub use crate::index::{QueryEngine, ReportIndex};
    pub use crate::llm::{LlmClient, MockLlmClient, OpenAiClient};
    pub use crate::markup::{Element, MarkupDocument, Node, ParseOptions};
    pub use crate::mcp::McpServer;
    pub use crate::search::{NameResolver, TavilyClient};
    pub use crate::tools::{McpTool, ReportService, ToolError, ToolRegistry};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
