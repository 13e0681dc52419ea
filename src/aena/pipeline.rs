//! 空港×移動種別×年の全タプルを順に処理するパイプライン
//!
//! 1つのブラウザセッションを占有し、タプルごとに
//! 実行 → 抽出 → 照合 → 型変換 を終えてから次の選択に進む。
//! タプル単位の失敗は記録して続行し、結果は [`RunReport`] にまとめて返す。

use std::borrow::Cow;
use std::sync::Arc;

use chrono::{Datelike, Local};
use tracing::{debug, info, warn};

use crate::config::{QueryPlan, ScraperConfig};
use crate::error::ScraperError;
use crate::traits::InteractionFacade;

use super::coercion::{coerce, RecordContext, RowError};
use super::executor::QueryExecutor;
use super::extractor::ResultExtractor;
use super::locators;
use super::navigation::{discover_airports, NavigationController, ReadyHandle};
use super::reshape::to_long;
use super::types::{
    CompletionSignal, ExecutionOutcome, Grouping, LongRecord, QueryParameters, RawRecord,
    StatisticType, TypedRecord, WideTable,
};
use super::validator::{validate, Discrepancy, ResponseEcho};

/// タプルの処理結果
#[derive(Debug, Clone)]
pub enum TupleOutcome {
    /// 取得した（型変換後の）行数
    Extracted(usize),
    /// 0件
    Empty,
    Failed(Arc<ScraperError>),
}

#[derive(Debug)]
pub struct TupleReport {
    pub params: QueryParameters,
    pub outcome: TupleOutcome,
    pub discrepancies: Vec<Discrepancy>,
    pub row_errors: Vec<RowError>,
}

impl TupleReport {
    fn new(params: QueryParameters, outcome: TupleOutcome) -> Self {
        Self {
            params,
            outcome,
            discrepancies: Vec::new(),
            row_errors: Vec::new(),
        }
    }
}

/// 実行結果（データ＋タプルごとの失敗・不一致）
#[derive(Debug)]
pub struct RunReport {
    pub wide: WideTable,
    pub tuples: Vec<TupleReport>,
}

impl RunReport {
    pub fn new(reference_year: i32) -> Self {
        Self {
            wide: WideTable::new(reference_year),
            tuples: Vec::new(),
        }
    }

    pub fn long_table(&self) -> Vec<LongRecord> {
        to_long(&self.wide)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&QueryParameters, &ScraperError)> {
        self.tuples.iter().filter_map(|t| match &t.outcome {
            TupleOutcome::Failed(e) => Some((&t.params, e.as_ref())),
            _ => None,
        })
    }

    pub fn discrepancies(&self) -> impl Iterator<Item = (&QueryParameters, &Discrepancy)> {
        self.tuples
            .iter()
            .flat_map(|t| t.discrepancies.iter().map(move |d| (&t.params, d)))
    }

    pub fn row_errors(&self) -> impl Iterator<Item = (&QueryParameters, &RowError)> {
        self.tuples
            .iter()
            .flat_map(|t| t.row_errors.iter().map(move |e| (&t.params, e)))
    }

    pub fn empty_count(&self) -> usize {
        self.tuples
            .iter()
            .filter(|t| matches!(t.outcome, TupleOutcome::Empty))
            .count()
    }
}

struct TupleData {
    records: Vec<TypedRecord>,
    discrepancies: Vec<Discrepancy>,
    row_errors: Vec<RowError>,
}

pub struct ExtractionPipeline<'a> {
    facade: &'a dyn InteractionFacade,
    config: &'a ScraperConfig,
    statistic: StatisticType,
    grouping: Grouping,
    reference_year: i32,
}

impl<'a> ExtractionPipeline<'a> {
    pub fn new(facade: &'a dyn InteractionFacade, config: &'a ScraperConfig) -> Self {
        Self {
            facade,
            config,
            statistic: StatisticType::Passengers,
            grouping: Grouping::ByAirline,
            reference_year: Local::now().year(),
        }
    }

    /// 当年クエリの `fecha` に使う年（デフォルトは現在の年）
    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.reference_year = year;
        self
    }

    /// 計画の全タプルを実行する
    ///
    /// タプル単位のエラー（タイムアウト、選択肢なし等）は記録して続行する。
    /// ブラウザ自体が使えない等の致命的エラーのみ `Err` を返す。
    ///
    /// 計画に空港がなければ、当年の検索画面の選択肢をすべて対象にする。
    pub async fn run(&self, plan: &QueryPlan) -> Result<RunReport, ScraperError> {
        plan.validate()?;
        let plan = self.resolve_airports(plan).await?;
        let mut report = RunReport::new(self.reference_year);
        let total = plan.tuples().len();
        info!("Starting extraction: {} tuples", total);

        for scope in plan.scopes() {
            let tuples = plan.tuples_for(scope);

            let ready = match NavigationController::new(self.facade, self.config)
                .prepare_query_context(scope, self.statistic, self.grouping)
                .await
            {
                Ok(ready) => ready,
                Err(e) if e.is_tuple_fatal() => {
                    warn!(%scope, "Query page not ready, skipping {} tuples: {}", tuples.len(), e);
                    self.facade.capture_debug_snapshot(&format!("navigation-{}", scope)).await;
                    let error = Arc::new(e);
                    report.tuples.extend(
                        tuples
                            .into_iter()
                            .map(|p| TupleReport::new(p, TupleOutcome::Failed(Arc::clone(&error)))),
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };

            for params in tuples {
                let tuple = self.process(&ready, params, &mut report.wide).await?;
                report.tuples.push(tuple);
                debug!(
                    "Progress: {}/{} tuples, {} wide rows",
                    report.tuples.len(),
                    total,
                    report.wide.len()
                );
            }
        }

        info!(
            wide_rows = report.wide.len(),
            empty = report.empty_count(),
            failed = report.failures().count(),
            discrepancies = report.discrepancies().count(),
            "Extraction finished"
        );
        Ok(report)
    }

    async fn resolve_airports<'p>(
        &self,
        plan: &'p QueryPlan,
    ) -> Result<Cow<'p, QueryPlan>, ScraperError> {
        if !plan.airports.is_empty() {
            return Ok(Cow::Borrowed(plan));
        }
        let airports = discover_airports(self.facade, self.config).await?;
        if airports.is_empty() {
            warn!("No airports available");
        }
        let mut plan = plan.clone();
        plan.airports = airports;
        Ok(Cow::Owned(plan))
    }

    async fn process(
        &self,
        ready: &ReadyHandle,
        params: QueryParameters,
        wide: &mut WideTable,
    ) -> Result<TupleReport, ScraperError> {
        match self.run_tuple(ready, &params).await {
            Ok(None) => {
                info!(%params, "No results");
                Ok(TupleReport::new(params, TupleOutcome::Empty))
            }
            Ok(Some(data)) => {
                let rows = data.records.len();
                wide.extend(data.records);
                info!(%params, "Extracted {} rows (total {})", rows, wide.len());
                Ok(TupleReport {
                    params,
                    outcome: TupleOutcome::Extracted(rows),
                    discrepancies: data.discrepancies,
                    row_errors: data.row_errors,
                })
            }
            Err(e) if e.is_tuple_fatal() => {
                warn!(%params, "Tuple failed: {}", e);
                self.facade.capture_debug_snapshot(&params.to_string()).await;
                Ok(TupleReport::new(params, TupleOutcome::Failed(Arc::new(e))))
            }
            Err(e) => Err(e),
        }
    }

    /// `None` は0件
    async fn run_tuple(
        &self,
        ready: &ReadyHandle,
        params: &QueryParameters,
    ) -> Result<Option<TupleData>, ScraperError> {
        let executor = QueryExecutor::new(self.facade, self.config);

        let signal = match executor.execute(ready, params).await? {
            ExecutionOutcome::Empty => return Ok(None),
            ExecutionOutcome::Completed(signal) => signal,
        };
        let reported = signal.reported_count();

        let extracted = self.drain(ready, &signal).await;
        // 抽出に失敗しても完了シグナルは必ず消費する。書き込めなくても抽出済みの行は残す
        if let Err(e) = executor.consume(signal).await {
            warn!(%params, "Failed to mark result count as consumed: {}", e);
        }
        let (raw, echo) = extracted?;

        let discrepancies = validate(&echo, params, raw.len(), reported);

        let ctx = RecordContext {
            movimiento: echo
                .movement()
                .unwrap_or(params.movement.label())
                .to_string(),
            aeropuerto: echo.airport().unwrap_or(&params.airport).to_string(),
            year: params.year,
        };
        let (records, row_errors) = coerce(raw, &ctx);

        Ok(Some(TupleData {
            records,
            discrepancies,
            row_errors,
        }))
    }

    async fn drain(
        &self,
        ready: &ReadyHandle,
        signal: &CompletionSignal,
    ) -> Result<(Vec<RawRecord>, ResponseEcho), ScraperError> {
        let echo = self.read_echo().await?;
        let raw = ResultExtractor::new(self.facade, ready.statistic(), ready.grouping())
            .extract_all(signal)
            .await?;
        Ok((raw, echo))
    }

    async fn read_echo(&self) -> Result<ResponseEcho, ScraperError> {
        match self.facade.find_one(&locators::echo_cell()).await {
            Ok(cell) => Ok(ResponseEcho::parse(&self.facade.text_of(&cell).await?)),
            Err(ScraperError::ElementNotFound(_)) => {
                warn!("Query echo not found");
                Ok(ResponseEcho::default())
            }
            Err(e) => Err(e),
        }
    }
}

/// [`ExtractionPipeline`] を既定設定で実行する
pub async fn run(
    facade: &dyn InteractionFacade,
    config: &ScraperConfig,
    plan: &QueryPlan,
) -> Result<RunReport, ScraperError> {
    ExtractionPipeline::new(facade, config).run(plan).await
}
