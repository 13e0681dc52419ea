use aena_scraper::{ExtractionRequest, ExtractionService, Movement, QueryPlan, ScraperConfig};
use tower::Service;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // ログ設定（RUST_LOG 未指定なら info）
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // AENA_PLAN にJSONのパスがあればそれを使う
    let plan = match std::env::var("AENA_PLAN") {
        Ok(path) => QueryPlan::from_file(&path).expect("failed to load AENA_PLAN"),
        Err(_) => QueryPlan::new(
            vec!["LA PALMA".to_string()],
            vec![Movement::Arrival, Movement::Departure],
        )
        .with_years([2019]),
    };

    let config = ScraperConfig::new()
        .with_headless(std::env::var("AENA_HEADED").is_err())
        .with_debug(std::env::var("AENA_DEBUG").is_ok());

    let request = ExtractionRequest::new(plan)
        .with_config(config)
        .with_output_dir("./output");

    println!("=== AENA Passenger Extraction ===");

    let mut service = ExtractionService::new();
    match service.call(request).await {
        Ok(response) => {
            let report = &response.report;
            println!("レコード数: {}", report.wide.len());
            println!("ロング形式: {} 行", report.long_table().len());
            println!("空の検索: {}", report.empty_count());
            for (params, err) in report.failures() {
                println!("失敗: {} -> {}", params, err);
            }
            for (params, d) in report.discrepancies() {
                println!("不一致: {} -> {}", params, d);
            }
            if let Some(files) = &response.files {
                println!("CSV保存先: {:?}, {:?}", files.wide, files.long);
            }
        }
        Err(e) => {
            eprintln!("エラー: {}", e);
        }
    }
}
