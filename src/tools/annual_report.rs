// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// FERRAMENTAS DE RELATÓRIO ANUAL
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// query_annual_report, fetch_org_data e get_org_no.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{McpTool, ReportService, ToolError, ToolRegistry};
use crate::config::ConfigError;
use crate::search::{candidate_org_numbers, NameResolver};

fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ToolError::InvalidParams(format!("Missing '{}' parameter", key)))
}

/// Aceita `2022` ou `"2022"`.
fn required_year(params: &Value) -> Result<i32, ToolError> {
    let value = params
        .get("year")
        .ok_or_else(|| ToolError::InvalidParams("Missing 'year' parameter".into()))?;

    let year = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    year.and_then(|y| i32::try_from(y).ok())
        .filter(|y| (1900..=9999).contains(y))
        .ok_or_else(|| ToolError::InvalidParams(format!("Invalid 'year' parameter: {}", value)))
}

/// Pergunta sobre a årsredovisning de uma empresa num ano.
pub struct QueryAnnualReportTool {
    service: Arc<ReportService>,
}

impl QueryAnnualReportTool {
    pub fn new(service: Arc<ReportService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl McpTool for QueryAnnualReportTool {
    fn name(&self) -> &'static str {
        "query_annual_report"
    }

    fn description(&self) -> &'static str {
        "Besvarar en fråga om ett svenskt bolags digitalt inlämnade årsredovisning för ett givet år. \
        Årsredovisningen hämtas från Bolagsverket och indexeras första gången den efterfrågas."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "org_no": {"type": "string", "description": "Organisationsnummer, t.ex. 5568925548"},
                "year": {"type": "integer", "description": "Räkenskapsår (slutet av rapporteringsperioden)"},
                "query": {"type": "string", "description": "Frågan som ska besvaras"}
            },
            "required": ["org_no", "year", "query"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let org_no = required_str(&params, "org_no")?;
        let year = required_year(&params)?;
        let query = required_str(&params, "query")?;

        let answer = self.service.query(org_no, year, query).await?;
        Ok(Value::String(answer))
    }
}

/// Dados cadastrais da organização na Bolagsverket.
pub struct FetchOrgDataTool {
    service: Arc<ReportService>,
}

impl FetchOrgDataTool {
    pub fn new(service: Arc<ReportService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl McpTool for FetchOrgDataTool {
    fn name(&self) -> &'static str {
        "fetch_org_data"
    }

    fn description(&self) -> &'static str {
        "Hämtar grundläggande uppgifter om en organisation (namn, adress, verksamhet) från Bolagsverket."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "org_no": {"type": "string", "description": "Organisationsnummer"}
            },
            "required": ["org_no"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let org_no = required_str(&params, "org_no")?;
        self.service.fetch_organisation(org_no).await
    }
}

/// Busca web pelo número de organização de uma empresa.
pub struct GetOrgNoTool {
    resolver: Result<Arc<dyn NameResolver>, ConfigError>,
}

impl GetOrgNoTool {
    pub fn new(resolver: Result<Arc<dyn NameResolver>, ConfigError>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl McpTool for GetOrgNoTool {
    fn name(&self) -> &'static str {
        "get_org_no"
    }

    fn description(&self) -> &'static str {
        "Söker efter organisationsnumret för en svensk organisation utifrån dess namn. \
        Returnerar de råa sökresultaten, eller null om sökningen misslyckas."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "company_name": {"type": "string", "description": "Organisationens namn"}
            },
            "required": ["company_name"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let company_name = required_str(&params, "company_name")?;
        let resolver = self.resolver.as_ref().map_err(|e| ToolError::Config(e.clone()))?;

        match resolver.resolve(company_name).await {
            Ok(result) => {
                let candidates = candidate_org_numbers(&result);
                log::info!("🔍 {}: candidatos {:?}", company_name, candidates);
                Ok(result)
            }
            Err(e) => {
                log::warn!("⚠️ Busca de organisationsnummer falhou para {}: {}", company_name, e);
                Ok(Value::Null)
            }
        }
    }
}

/// Registro com as três ferramentas, na ordem publicada em `tools/list`.
pub fn annual_report_tools(
    service: Arc<ReportService>,
    resolver: Result<Arc<dyn NameResolver>, ConfigError>,
) -> ToolRegistry {
    ToolRegistry::new()
        .with(Arc::new(QueryAnnualReportTool::new(service.clone())))
        .with(Arc::new(FetchOrgDataTool::new(service)))
        .with(Arc::new(GetOrgNoTool::new(resolver)))
}
