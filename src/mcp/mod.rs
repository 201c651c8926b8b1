//! # Servidor MCP
//!
//! Model Context Protocol sobre JSON-RPC 2.0 em stdio.
//!
//! ## Métodos
//!
//! - `initialize` - negocia versão do protocolo e anuncia `tools`
//! - `notifications/initialized` - sem resposta
//! - `ping`
//! - `tools/list` - as ferramentas do [`ToolRegistry`](crate::tools::ToolRegistry)
//! - `tools/call` - executa uma ferramenta; falhas viram `isError: true`
//!
//! stdout é reservado ao protocolo: todo log vai para stderr.

mod server;
pub mod types;

pub use server::McpServer;
pub use types::*;
