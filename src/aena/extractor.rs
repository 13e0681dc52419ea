//! 結果テーブルの読み取り

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use tracing::{debug, warn};

use crate::error::ScraperError;
use crate::traits::{ElementRef, InteractionFacade};

use super::locators;
use super::types::{CompletionSignal, Grouping, RawRecord, StatisticType};

pub struct ResultExtractor<'a> {
    facade: &'a dyn InteractionFacade,
    statistic: StatisticType,
    grouping: Grouping,
}

impl<'a> ResultExtractor<'a> {
    pub fn new(facade: &'a dyn InteractionFacade, statistic: StatisticType, grouping: Grouping) -> Self {
        Self {
            facade,
            statistic,
            grouping,
        }
    }

    /// データ行を正規列の `RawRecord` として順に返すストリーム
    ///
    /// ヘッダー行と行一覧は呼び出し時に解決し、各行のセルはストリームを
    /// 進めたときに読む。`signal` が指す合計行は含めない。ライブのページ状態に
    /// 依存するため再開はできない。
    pub async fn extract(
        &self,
        signal: &CompletionSignal,
    ) -> Result<BoxStream<'a, Result<RawRecord, ScraperError>>, ScraperError> {
        // 合計行が再描画されていれば StaleElement になる
        let total_id = Arc::new(self.facade.attribute_of(signal.total_row(), "id").await?);

        // 先頭の装飾行は省略されることがあるので、位置ではなくマーカーセルから辿る
        let header_row = self
            .facade
            .find_one(&locators::header_row(self.statistic))
            .await?;
        let header = Arc::new(parse_header(&self.facade.text_of(&header_row).await?));
        debug!("Result header: {:?}", header);

        let rows = self
            .facade
            .find_all(&locators::data_rows(self.grouping))
            .await?;
        debug!("{} rows matched (including total)", rows.len());

        let facade = self.facade;

        let records = stream::iter(rows)
            .then(move |row| {
                let header = Arc::clone(&header);
                let total_id = Arc::clone(&total_id);
                async move { read_row(facade, &row, &header, &total_id).await }
            })
            .try_filter_map(|record| async move { Ok(record) })
            .boxed();

        Ok(records)
    }

    /// [`extract`](Self::extract) を最後まで読む
    pub async fn extract_all(
        &self,
        signal: &CompletionSignal,
    ) -> Result<Vec<RawRecord>, ScraperError> {
        self.extract(signal).await?.try_collect().await
    }
}

/// `"Total Ene Feb"` → `["airline", "total", "ene", "feb"]`
pub fn parse_header(text: &str) -> Vec<String> {
    std::iter::once("airline".to_string())
        .chain(text.to_lowercase().split_whitespace().map(str::to_string))
        .collect()
}

async fn read_row(
    facade: &dyn InteractionFacade,
    row: &ElementRef,
    header: &[String],
    total_id: &str,
) -> Result<Option<RawRecord>, ScraperError> {
    let id = facade.attribute_of(row, "id").await?;
    if id == total_id {
        return Ok(None);
    }

    let cells = facade.find_all_within(row, &locators::row_cells()).await?;
    let mut values = Vec::with_capacity(cells.len());
    for cell in &cells {
        let value = facade.attribute_of(cell, "textContent").await?;
        let value = value.trim();
        if !value.is_empty() {
            values.push(value.to_string());
        }
    }

    if values.len() != header.len() {
        warn!(
            row = %id,
            "Row has {} values for {} header columns",
            values.len(),
            header.len()
        );
    }

    Ok(Some(RawRecord::align(header, &values)))
}
