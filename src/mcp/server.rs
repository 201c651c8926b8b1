// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SERVIDOR MCP (STDIO)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Uma mensagem JSON-RPC por linha em stdin, uma resposta por linha em
// stdout. Requests são tratados em sequência.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use super::types::*;
use crate::tools::{ToolError, ToolRegistry};

/// Servidor MCP sobre um [`ToolRegistry`].
pub struct McpServer {
    registry: ToolRegistry,
    version: String,
}

impl McpServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            version: crate::VERSION.to_string(),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Trata uma linha recebida; `None` quando não há resposta a enviar.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("⚠️ JSON inválido: {}", e);
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    JsonRpcError::new(PARSE_ERROR, format!("Parse error: {}", e)),
                ));
            }
        };

        let id = value.get("id").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => Some(JsonRpcResponse::failure(
                id,
                JsonRpcError::new(INVALID_REQUEST, format!("Invalid request: {}", e)),
            )),
        }
    }

    /// Trata um request já decodificado.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        log::debug!("📨 {}", request.method);

        let outcome = self.dispatch(&request.method, request.params.clone()).await;
        if request.is_notification() {
            if let Err(e) = outcome {
                log::debug!("Notificação {} ignorada: {}", request.method, e.message);
            }
            return None;
        }

        let id = request.id.unwrap_or(Value::Null);
        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        })
    }

    async fn dispatch(&self, method: &str, params: Option<Value>) -> Result<Value, JsonRpcError> {
        match method {
            "initialize" => self.initialize(params),
            "notifications/initialized" | "initialized" => Ok(Value::Null),
            "ping" => Ok(json!({})),
            "tools/list" => to_result(&ListToolsResult {
                tools: self.registry.list(),
            }),
            "tools/call" => self.call_tool(params).await,
            other => Err(JsonRpcError::method_not_found(other)),
        }
    }

    fn initialize(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: InitializeParams = match params {
            Some(value) => serde_json::from_value(value).unwrap_or_default(),
            None => InitializeParams::default(),
        };
        let protocol_version = params
            .protocol_version
            .unwrap_or_else(|| DEFAULT_PROTOCOL_VERSION.to_string());

        log::info!("🤝 initialize (protocolo {})", protocol_version);

        to_result(&InitializeResult {
            protocol_version,
            capabilities: json!({ "tools": {} }),
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: self.version.clone(),
            },
        })
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: CallToolParams = params
            .ok_or_else(|| JsonRpcError::invalid_params("Missing params"))
            .and_then(|value| {
                serde_json::from_value(value).map_err(|e| JsonRpcError::invalid_params(e.to_string()))
            })?;

        let arguments = params.arguments.unwrap_or_else(|| json!({}));
        let result = match self.registry.call(&params.name, arguments).await {
            Ok(value) => CallToolResult::from_value(&value),
            Err(e @ ToolError::UnknownTool(_)) => return Err(JsonRpcError::invalid_params(e.to_string())),
            Err(e) if e.is_invalid_params() => return Err(JsonRpcError::invalid_params(e.to_string())),
            Err(e) => CallToolResult::error(e.to_string()),
        };
        to_result(&result)
    }

    /// Lê requests de `reader` até EOF e escreve as respostas em `writer`.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(response) = self.handle_line(line).await {
                let mut payload = serde_json::to_vec(&response)?;
                payload.push(b'\n');
                writer.write_all(&payload).await?;
                writer.flush().await?;
            }
        }

        log::info!("👋 stdin fechado, encerrando servidor MCP");
        Ok(())
    }

    /// Serve em stdin/stdout.
    pub async fn serve_stdio(&self) -> std::io::Result<()> {
        log::info!(
            "🚀 {} v{} ouvindo em stdio ({} ferramentas)",
            SERVER_NAME,
            self.version,
            self.registry.len()
        );
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
    }
}

fn to_result<T: serde::Serialize>(value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::new(INTERNAL_ERROR, e.to_string()))
}
