use invoice_recon_rust::api::{self, AppState};
use invoice_recon_rust::service::{loader, TracingSink};
use invoice_recon_rust::{AppConfig, ReconciliationEngine};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

const USAGE: &str = "usage: invoice-recon-rust [reconcile <invoices.json> <lines.csv>]";

/// 离线对账: 读取文件，结果以 JSON 输出到标准输出
fn run_batch(config: &AppConfig, args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let [invoices_path, lines_path] = args else {
        return Err(USAGE.into());
    };

    let engine = ReconciliationEngine::new(config.reconciliation.clone())?;
    let invoices = loader::load_invoices(invoices_path)?;
    let lines = loader::load_lines(lines_path)?;

    let result = engine.reconcile(invoices, lines, &TracingSink);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 本地时间格式
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    // 加载配置
    let config = AppConfig::load()?;
    info!("Loaded config: {:?}", config);

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("reconcile") => return run_batch(&config, &args[1..]),
        Some(other) => return Err(format!("unknown command '{}'\n{}", other, USAGE).into()),
        None => {}
    }

    let state = Arc::new(AppState {
        default_config: config.reconciliation.clone(),
        run_timeout: Duration::from_secs(config.server.run_timeout_secs),
    });
    let app = api::router(state);

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  GET  /health");
    info!("  POST /api/reconcile");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
