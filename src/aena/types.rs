//! AENA 旅客統計の型定義

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ScraperError;
use crate::traits::ElementRef;

/// データなしを表すセンチネル（数値のゼロとは別物）
pub const MISSING: &str = "--";

/// 月コード（リモートの表示順）
pub const MONTHS: [&str; 12] = [
    "ene", "feb", "mar", "abr", "may", "jun", "jul", "ago", "sep", "oct", "nov", "dic",
];

/// 数値列（`total` + 12ヶ月）
pub const NUMERIC_COLUMNS: [&str; 13] = [
    "total", "ene", "feb", "mar", "abr", "may", "jun", "jul", "ago", "sep", "oct", "nov", "dic",
];

/// ワイドレコードの正規列順
pub const CANONICAL_COLUMNS: [&str; 14] = [
    "airline", "total", "ene", "feb", "mar", "abr", "may", "jun", "jul", "ago", "sep", "oct",
    "nov", "dic",
];

/// 統計種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StatisticType {
    #[default]
    Passengers,
}

impl StatisticType {
    /// メニュー上の表示ラベル
    pub fn label(&self) -> &'static str {
        match self {
            StatisticType::Passengers => "1. Pasajeros",
        }
    }

    /// 結果テーブルでヘッダー行の直前に置かれるマーカーセル
    pub fn marker(&self) -> &'static str {
        match self {
            StatisticType::Passengers => "Pasajeros",
        }
    }
}

/// 集計単位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Grouping {
    #[default]
    ByAirline,
}

impl Grouping {
    pub fn label(&self) -> &'static str {
        match self {
            Grouping::ByAirline => "NOMBRE COMPAÑIA",
        }
    }

    /// データ行の id 接頭辞
    pub fn row_id_prefix(&self) -> String {
        format!("{}:", self.label())
    }

    /// 合計行の id 接頭辞
    pub fn total_row_id_prefix(&self) -> String {
        format!("{}:Total", self.label())
    }
}

/// 移動種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Movement {
    #[serde(rename = "LLEGADA")]
    Arrival,
    #[serde(rename = "SALIDA")]
    Departure,
}

impl Movement {
    pub fn label(&self) -> &'static str {
        match self {
            Movement::Arrival => "LLEGADA",
            Movement::Departure => "SALIDA",
        }
    }
}

impl fmt::Display for Movement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Movement {
    type Err = ScraperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LLEGADA" | "ARRIVAL" => Ok(Movement::Arrival),
            "SALIDA" | "DEPARTURE" => Ok(Movement::Departure),
            other => Err(ScraperError::Config(format!("不明な移動種別: {}", other))),
        }
    }
}

/// クエリの対象範囲（ナビゲーション経路を決める）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryScope {
    /// 当年（暫定データ、年セレクタなし）
    CurrentYear,
    /// 過去年（確定データ、年セレクタあり）
    HistoricalYear(i32),
}

impl QueryScope {
    pub fn from_year(year: Option<i32>) -> Self {
        match year {
            Some(y) => QueryScope::HistoricalYear(y),
            None => QueryScope::CurrentYear,
        }
    }

    pub fn year(&self) -> Option<i32> {
        match self {
            QueryScope::CurrentYear => None,
            QueryScope::HistoricalYear(y) => Some(*y),
        }
    }
}

impl fmt::Display for QueryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryScope::CurrentYear => f.write_str("current-year"),
            QueryScope::HistoricalYear(y) => write!(f, "{}", y),
        }
    }
}

/// 1回のクエリを識別するパラメータ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParameters {
    pub statistic: StatisticType,
    pub grouping: Grouping,
    pub airport: String,
    pub movement: Movement,
    pub year: Option<i32>,
}

impl QueryParameters {
    pub fn new(airport: impl Into<String>, movement: Movement, year: Option<i32>) -> Self {
        Self {
            statistic: StatisticType::Passengers,
            grouping: Grouping::ByAirline,
            airport: airport.into(),
            movement,
            year,
        }
    }

    pub fn scope(&self) -> QueryScope {
        QueryScope::from_year(self.year)
    }
}

impl fmt::Display for QueryParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} / {}", self.airport, self.movement, self.scope())
    }
}

/// リモートの計算完了を示すハンドル
///
/// 同一セッションで次のクエリを発行するまでのみ有効。抽出後は必ず
/// [`QueryExecutor::consume`](super::executor::QueryExecutor::consume) に渡すこと。
#[derive(Debug)]
#[must_use = "completion signals must be consumed before the next query"]
pub struct CompletionSignal {
    pub(crate) reported_count: u32,
    pub(crate) indicator: ElementRef,
    pub(crate) total_row: ElementRef,
}

impl CompletionSignal {
    pub fn reported_count(&self) -> u32 {
        self.reported_count
    }

    pub fn total_row(&self) -> &ElementRef {
        &self.total_row
    }
}

/// クエリ実行結果
#[derive(Debug)]
pub enum ExecutionOutcome {
    /// 0件（抽出不要）
    Empty,
    Completed(CompletionSignal),
}

/// 正規13列に揃えた生文字列レコード
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    cells: Vec<String>,
}

impl RawRecord {
    /// ヘッダー由来の列名と位置で対応づけ、正規列に並べ替える
    ///
    /// ヘッダーにない列はセンチネルで埋める。
    pub fn align(header: &[String], values: &[String]) -> Self {
        let cells = CANONICAL_COLUMNS
            .iter()
            .map(|column| {
                header
                    .iter()
                    .position(|h| h == column)
                    .and_then(|idx| values.get(idx))
                    .cloned()
                    .unwrap_or_else(|| MISSING.to_string())
            })
            .collect();
        Self { cells }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        CANONICAL_COLUMNS
            .iter()
            .position(|c| *c == column)
            .map(|idx| self.cells[idx].as_str())
    }

    pub fn airline(&self) -> &str {
        &self.cells[0]
    }

    /// `(列名, 値)` を正規順で返す
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        CANONICAL_COLUMNS
            .iter()
            .copied()
            .zip(self.cells.iter().map(String::as_str))
    }
}

/// 型変換済みのワイドレコード
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypedRecord {
    pub airline: String,
    pub movimiento: String,
    pub aeropuerto: String,
    /// 過去年クエリのみ
    pub year: Option<i32>,
    pub total: Option<i64>,
    /// `ene`..`dic`
    pub months: [Option<i64>; 12],
}

impl TypedRecord {
    pub fn month(&self, code: &str) -> Option<i64> {
        MONTHS
            .iter()
            .position(|m| *m == code)
            .and_then(|idx| self.months[idx])
    }

    /// 数値列を文字列に戻す（欠損はセンチネル）
    pub fn to_raw(&self) -> RawRecord {
        let fmt = |v: Option<i64>| v.map_or_else(|| MISSING.to_string(), |n| n.to_string());
        let mut cells = Vec::with_capacity(CANONICAL_COLUMNS.len());
        cells.push(self.airline.clone());
        cells.push(fmt(self.total));
        cells.extend(self.months.iter().map(|v| fmt(*v)));
        RawRecord { cells }
    }
}

/// クエリ横断で蓄積するワイドテーブル（重複排除なし）
#[derive(Debug, Clone, Default)]
pub struct WideTable {
    pub records: Vec<TypedRecord>,
    /// `year` を持たない（当年）レコードの年
    pub reference_year: i32,
}

impl WideTable {
    pub fn new(reference_year: i32) -> Self {
        Self {
            records: Vec::new(),
            reference_year,
        }
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = TypedRecord>) {
        self.records.extend(records);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 過去年のレコードを含むか（`year` 列の出力要否）
    pub fn has_year(&self) -> bool {
        self.records.iter().any(|r| r.year.is_some())
    }
}

/// ロング形式レコード（航空会社×月）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongRecord {
    pub airline: String,
    pub movimiento: String,
    pub aeropuerto: String,
    pub fecha: String,
    pub num_pasajeros: i64,
}
