//! AENA 旅客統計スクレイパーライブラリ
//!
//! - 空港 × 移動種別 × 年 の組み合わせごとに検索を実行
//! - 航空会社別の月次旅客数をワイド形式・ロング形式で取得
//!
//! # 使用例
//!
//! ```rust,ignore
//! use aena_scraper::{ExtractionRequest, ExtractionService, Movement, QueryPlan};
//! use tower::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let plan = QueryPlan::new(vec!["LA PALMA".into()], vec![Movement::Arrival, Movement::Departure])
//!         .with_years([2018, 2019]);
//!
//!     let mut service = ExtractionService::new();
//!     let request = ExtractionRequest::new(plan).with_output_dir("./output");
//!
//!     let response = service.call(request).await.unwrap();
//!     println!("Records: {}", response.report.wide.len());
//! }
//! ```
//!
//! # ブラウザを差し替える場合
//!
//! ```rust,ignore
//! use aena_scraper::aena::pipeline;
//! use aena_scraper::{ChromeSession, QueryPlan, ScraperConfig};
//!
//! let config = ScraperConfig::new().with_headless(false);
//! let mut session = ChromeSession::new(config.clone());
//! session.initialize().await?;
//! let report = pipeline::run(&session, &config, &plan).await?;
//! session.close().await?;
//! ```

pub mod aena;
pub mod chrome;
pub mod config;
pub mod error;
pub mod export;
pub mod poll;
pub mod service;
pub mod traits;

#[cfg(test)]
mod testing;

// 主要な型をリエクスポート
pub use aena::{
    Discrepancy, ExtractionPipeline, LongRecord, Movement, QueryParameters, QueryScope, RunReport,
    TupleOutcome, TypedRecord, WideTable,
};
pub use chrome::ChromeSession;
pub use config::{QueryPlan, ScraperConfig};
pub use error::ScraperError;
pub use service::{ExtractionRequest, ExtractionResponse, ExtractionService};
pub use traits::InteractionFacade;
