//! AENA 旅客統計の抽出エンジン
//!
//! ナビゲーション → 検索実行 → 結果抽出 → 照合 → 型変換 → 整形 の順に処理する。
//! 各段はブラウザを [`InteractionFacade`](crate::traits::InteractionFacade) 越しにのみ扱う。

pub mod coercion;
pub mod executor;
pub mod extractor;
pub mod locators;
pub mod navigation;
pub mod pipeline;
pub mod reshape;
pub mod types;
pub mod validator;

pub use coercion::{RecordContext, RowError};
pub use executor::QueryExecutor;
pub use extractor::ResultExtractor;
pub use navigation::{available_options, discover_airports, NavigationController, ReadyHandle};
pub use pipeline::{ExtractionPipeline, RunReport, TupleOutcome, TupleReport};
pub use types::{
    CompletionSignal, ExecutionOutcome, Grouping, LongRecord, Movement, QueryParameters,
    QueryScope, RawRecord, StatisticType, TypedRecord, WideTable, MISSING, MONTHS,
};
pub use validator::{Discrepancy, ResponseEcho};
