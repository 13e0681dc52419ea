//! 1タプル分のクエリ実行と完了検知

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::poll::{wait_until, WaitCondition};
use crate::traits::{ElementRef, InteractionFacade, Locator};

use super::locators;
use super::navigation::ReadyHandle;
use super::types::{CompletionSignal, ExecutionOutcome, QueryParameters};

/// ブラウザセッションを占有してクエリを1件ずつ実行する
pub struct QueryExecutor<'a> {
    facade: &'a dyn InteractionFacade,
    config: &'a ScraperConfig,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(facade: &'a dyn InteractionFacade, config: &'a ScraperConfig) -> Self {
        Self { facade, config }
    }

    /// パラメータを適用して検索し、完了まで待つ
    ///
    /// セレクトはリモートが描画ごとに作り直すため、毎回ここで探し直す。
    /// 件数表示はデータ行より先に現れるので、件数が0でなければ合計行の出現まで待つ。
    pub async fn execute(
        &self,
        ready: &ReadyHandle,
        params: &QueryParameters,
    ) -> Result<ExecutionOutcome, ScraperError> {
        if ready.scope() != params.scope() {
            return Err(ScraperError::Navigation(format!(
                "準備済みスコープ {} とクエリ {} が一致しません",
                ready.scope(),
                params
            )));
        }

        // 前のタプルの参照はもう使わない
        self.facade.release_elements().await?;

        if !self.config.inter_query_delay.is_zero() {
            debug!("Sleeping {:?} before query", self.config.inter_query_delay);
            sleep(self.config.inter_query_delay).await;
        }

        info!(
            airport = %params.airport,
            movement = %params.movement,
            scope = %params.scope(),
            "Starting search"
        );

        self.select_fresh(&locators::airport_select(), &params.airport)
            .await?;
        self.select_fresh(&locators::movement_select(), params.movement.label())
            .await?;

        self.facade
            .invoke_named_action(locators::SEARCH_ACTION)
            .await?;

        let indicator = wait_until(
            self.facade,
            &WaitCondition::Visible(locators::result_count()),
            self.config.search_timeout,
            self.config.poll_interval,
        )
        .await
        .map_err(|e| search_timeout(params, "結果件数", e))?;

        let text = self.facade.text_of(&indicator).await?;
        let reported_count = parse_result_count(&text)?;
        info!("Search finished. {} results found", reported_count);

        if reported_count == 0 {
            self.mark_consumed(&indicator).await?;
            return Ok(ExecutionOutcome::Empty);
        }

        let total_row = match wait_until(
            self.facade,
            &WaitCondition::Visible(locators::total_row(ready.grouping())),
            self.config.search_timeout,
            self.config.poll_interval,
        )
        .await
        {
            Ok(row) => row,
            Err(e) => {
                // 件数表示は見えているので、次のタプルが誤検知しないよう消しておく
                if let Err(mark_err) = self.mark_consumed(&indicator).await {
                    debug!("Failed to mark indicator after timeout: {}", mark_err);
                }
                return Err(search_timeout(params, "合計行", e));
            }
        };
        debug!("Total row rendered");

        Ok(ExecutionOutcome::Completed(CompletionSignal {
            reported_count,
            indicator,
            total_row,
        }))
    }

    /// 抽出後に完了シグナルを消費する
    ///
    /// 件数セルの文言を書き換え、次の検索のポーリングが前回の表示に一致しないようにする。
    pub async fn consume(&self, signal: CompletionSignal) -> Result<(), ScraperError> {
        self.mark_consumed(&signal.indicator).await
    }

    async fn mark_consumed(&self, indicator: &ElementRef) -> Result<(), ScraperError> {
        self.facade
            .set_property(indicator, "innerText", locators::CONSUMED_MARKER_TEXT)
            .await
    }

    async fn select_fresh(&self, locator: &Locator, label: &str) -> Result<(), ScraperError> {
        let control = self.facade.find_one(locator).await?;
        self.facade.select_by_visible_label(&control, label).await
    }
}

fn search_timeout(params: &QueryParameters, what: &str, err: ScraperError) -> ScraperError {
    match err {
        ScraperError::Timeout(msg) => {
            warn!(%params, "Timed out waiting for {}", what);
            ScraperError::SearchTimeout(format!("{} ({}): {}", params, what, msg))
        }
        other => other,
    }
}

/// `"1.234 resultados encontrados"` の先頭の数値
pub fn parse_result_count(text: &str) -> Result<u32, ScraperError> {
    let token = text.split_whitespace().next().unwrap_or_default();
    token
        .replace('.', "")
        .parse::<u32>()
        .map_err(|_| ScraperError::MalformedNumber {
            column: locators::RESULT_COUNT_TEXT.to_string(),
            value: text.to_string(),
        })
}
