// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ANNUAL REPORT MCP
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Uso:
//   annual-report-mcp                       servidor MCP em stdio (padrão)
//   annual-report-mcp --serve               idem
//   annual-report-mcp --render <arquivo>    imprime o texto extraído de um .xhtml
//   annual-report-mcp --query <org_no> <ano> <pergunta>
//
// stdout é o canal MCP; logs e mensagens vão para stderr.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use annual_report::config::ConfigError;
use annual_report::search::{NameResolver, TavilyClient};
use annual_report::{
    annual_report_tools, create_tokio_runtime, install_panic_hook, load_app_config, AppConfig, McpServer,
    ReportService,
};

/// Tenta carregar o arquivo .env de múltiplos locais possíveis
fn load_dotenv() {
    let possible_paths = [
        // Diretório atual
        PathBuf::from(".env"),
        // Diretório pai
        PathBuf::from("../.env"),
        // Diretório do crate em tempo de compilação (fallback)
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(".env"),
    ];

    for path in &possible_paths {
        if path.exists() {
            match dotenvy::from_path(path) {
                Ok(_) => {
                    eprintln!(
                        "✓ Carregado .env de: {:?}",
                        path.canonicalize().unwrap_or(path.clone())
                    );
                    return;
                }
                Err(e) => {
                    eprintln!("⚠ Erro ao carregar {:?}: {}", path, e);
                }
            }
        }
    }

    if dotenvy::dotenv().is_err() {
        eprintln!("⚠ Nenhum arquivo .env encontrado; usando apenas variáveis de ambiente.");
    }
}

fn print_usage(program: &str) {
    eprintln!("Annual Report MCP v{}", annual_report::VERSION);
    eprintln!();
    eprintln!("Uso: {} [opção]", program);
    eprintln!();
    eprintln!("Opções:");
    eprintln!("  --serve                          Servidor MCP em stdio (padrão)");
    eprintln!("  --render <arquivo.xhtml>         Imprime o texto extraído do relatório");
    eprintln!("  --query <org_no> <ano> <pergunta> Responde uma pergunta sem MCP");
    eprintln!();
    eprintln!("Exemplos:");
    eprintln!("  {} --render 5568925548_2022.xhtml", program);
    eprintln!("  {} --query 5568925548 2022 \"Hur stor var nettoomsättningen?\"", program);
}

enum Mode {
    Serve,
    Render(PathBuf),
    Query { org_no: String, year: i32, question: String },
    Help,
}

fn parse_args(args: &[String]) -> anyhow::Result<Mode> {
    match args.get(1).map(String::as_str) {
        None | Some("--serve") => Ok(Mode::Serve),
        Some("--help") | Some("-h") => Ok(Mode::Help),
        Some("--render") => {
            let file = args.get(2).context("--render requer um arquivo")?;
            Ok(Mode::Render(PathBuf::from(file)))
        }
        Some("--query") => {
            if args.len() < 5 {
                anyhow::bail!("--query requer <org_no> <ano> <pergunta>");
            }
            let year = args[3]
                .parse::<i32>()
                .with_context(|| format!("ano inválido: {}", args[3]))?;
            Ok(Mode::Query {
                org_no: args[2].clone(),
                year,
                question: args[4..].join(" "),
            })
        }
        Some(other) => anyhow::bail!("opção desconhecida: {}", other),
    }
}

fn name_resolver(config: &AppConfig) -> Result<Arc<dyn NameResolver>, ConfigError> {
    TavilyClient::from_config(config)
        .map(|client| Arc::new(client) as Arc<dyn NameResolver>)
        .map_err(|_| ConfigError::Missing("TAVILY_API_KEY"))
}

async fn run(mode: Mode, config: AppConfig) -> anyhow::Result<()> {
    let service = Arc::new(ReportService::from_config(&config));

    match mode {
        Mode::Serve => {
            let registry = annual_report_tools(service, name_resolver(&config));
            McpServer::new(registry)
                .serve_stdio()
                .await
                .context("servidor MCP falhou")?;
        }
        Mode::Render(path) => {
            let text = service
                .render_file(&path)
                .await
                .with_context(|| format!("falha ao renderizar {}", path.display()))?;
            println!("{}", text);
        }
        Mode::Query {
            org_no,
            year,
            question,
        } => {
            let answer = service.query(&org_no, year, &question).await?;
            println!("{}", answer);
        }
        Mode::Help => unreachable!("tratado em main"),
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    // Carregar .env PRIMEIRO, antes de qualquer coisa
    load_dotenv();

    // Logs em stderr: stdout é do protocolo
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();
    install_panic_hook();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("annual-report-mcp");

    let mode = match parse_args(&args) {
        Ok(Mode::Help) => {
            print_usage(program);
            return Ok(());
        }
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("✗ {}", e);
            eprintln!();
            print_usage(program);
            std::process::exit(2);
        }
    };

    let config = load_app_config();
    let runtime = create_tokio_runtime(&config.runtime)?;
    runtime.block_on(run(mode, config))
}
