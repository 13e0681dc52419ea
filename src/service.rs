use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use tower::Service;
use tracing::{info, warn};

use crate::aena::pipeline::{ExtractionPipeline, RunReport};
use crate::chrome::ChromeSession;
use crate::config::{QueryPlan, ScraperConfig};
use crate::error::ScraperError;
use crate::export::{export_run, ExportedFiles};

/// 抽出リクエスト
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub config: ScraperConfig,
    pub plan: QueryPlan,
    /// 指定時はCSVを書き出す
    pub output_dir: Option<PathBuf>,
}

impl ExtractionRequest {
    pub fn new(plan: QueryPlan) -> Self {
        Self {
            config: ScraperConfig::default(),
            plan,
            output_dir: None,
        }
    }

    pub fn with_config(mut self, config: ScraperConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }
}

/// 抽出結果
#[derive(Debug)]
pub struct ExtractionResponse {
    pub report: RunReport,
    pub files: Option<ExportedFiles>,
}

/// tower::Serviceを実装した抽出サービス
#[derive(Debug, Clone, Default)]
pub struct ExtractionService {}

impl ExtractionService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Service<ExtractionRequest> for ExtractionService {
    type Response = ExtractionResponse;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ExtractionRequest) -> Self::Future {
        info!(
            "抽出リクエスト受信: airports={}, movements={}, years={:?}",
            req.plan.airports.len(),
            req.plan.movements.len(),
            req.plan.years
        );

        Box::pin(async move {
            let ExtractionRequest {
                config,
                plan,
                output_dir,
            } = req;

            let mut session = ChromeSession::new(config.clone());
            session.initialize().await?;

            let result = ExtractionPipeline::new(&session, &config).run(&plan).await;

            if let Err(e) = session.close().await {
                warn!("Failed to close browser: {}", e);
            }
            let report = result?;

            let files = match output_dir {
                Some(dir) => Some(export_run(dir, &report)?),
                None => None,
            };

            info!(
                "抽出完了: records={}, failed={}, empty={}",
                report.wide.len(),
                report.failures().count(),
                report.empty_count()
            );

            Ok(ExtractionResponse { report, files })
        })
    }
}
