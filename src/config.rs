use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::aena::{Movement, QueryParameters, QueryScope};
use crate::error::ScraperError;

pub const AENA_STATS_URL: &str = "https://wwwssl.aena.es/csee/Satellite?pagename=Estadisticas/Home";

/// ブラウザ・ポーリング設定
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub base_url: String,
    pub headless: bool,
    /// 未指定なら `CHROME_PATH` / `CHROMIUM_PATH` 環境変数、最後に `chromium`
    pub chrome_path: Option<PathBuf>,
    pub debug: bool,
    /// クエリ準備完了までの待機上限
    pub navigation_timeout: Duration,
    /// 検索結果・合計行の待機上限
    pub search_timeout: Duration,
    pub poll_interval: Duration,
    /// 各クエリ前の待機（リモート側のデバウンスと重ならないように）
    pub inter_query_delay: Duration,
    /// CDPリクエストタイムアウト
    pub request_timeout: Duration,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: AENA_STATS_URL.to_string(),
            headless: true,
            chrome_path: None,
            debug: false,
            navigation_timeout: Duration::from_secs(30),
            search_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
            inter_query_delay: Duration::from_secs(5),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl ScraperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    pub fn with_search_timeout(mut self, timeout: Duration) -> Self {
        self.search_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_inter_query_delay(mut self, delay: Duration) -> Self {
        self.inter_query_delay = delay;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Chrome実行ファイルのパスを解決
    pub fn resolve_chrome_path(&self) -> PathBuf {
        self.chrome_path.clone().unwrap_or_else(|| {
            std::env::var("CHROME_PATH")
                .or_else(|_| std::env::var("CHROMIUM_PATH"))
                .unwrap_or_else(|_| "chromium".to_string())
                .into()
        })
    }
}

/// 問い合わせ対象（空港×移動種別×年）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPlan {
    /// 空港の表示ラベル（空なら実行時に選択肢から取得する）
    #[serde(default)]
    pub airports: Vec<String>,
    pub movements: Vec<Movement>,
    /// 当年（暫定データ）を問い合わせるか
    #[serde(default = "default_true")]
    pub current_year: bool,
    /// 過去年（確定データ）
    #[serde(default)]
    pub years: Vec<i32>,
}

fn default_true() -> bool {
    true
}

impl QueryPlan {
    pub fn new(airports: Vec<String>, movements: Vec<Movement>) -> Self {
        Self {
            airports,
            movements,
            current_year: true,
            years: Vec::new(),
        }
    }

    pub fn with_current_year(mut self, current_year: bool) -> Self {
        self.current_year = current_year;
        self
    }

    pub fn with_years(mut self, years: impl IntoIterator<Item = i32>) -> Self {
        self.years = years.into_iter().collect();
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, ScraperError> {
        let plan: QueryPlan = serde_json::from_str(json)?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScraperError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<(), ScraperError> {
        if self.movements.is_empty() {
            return Err(ScraperError::Config("movements が空です".into()));
        }
        if !self.current_year && self.years.is_empty() {
            return Err(ScraperError::Config(
                "current_year が false で years も空です".into(),
            ));
        }
        Ok(())
    }

    /// 実行順のスコープ（当年 → 過去年）
    pub fn scopes(&self) -> Vec<QueryScope> {
        let mut scopes = Vec::with_capacity(self.years.len() + 1);
        if self.current_year {
            scopes.push(QueryScope::CurrentYear);
        }
        scopes.extend(self.years.iter().map(|y| QueryScope::HistoricalYear(*y)));
        scopes
    }

    /// スコープ内のタプル（空港 → 移動種別の順）
    pub fn tuples_for(&self, scope: QueryScope) -> Vec<QueryParameters> {
        self.airports
            .iter()
            .flat_map(|airport| {
                self.movements
                    .iter()
                    .map(move |m| QueryParameters::new(airport.clone(), *m, scope.year()))
            })
            .collect()
    }

    /// 全タプル（スコープ → 空港 → 移動種別の順）
    pub fn tuples(&self) -> Vec<QueryParameters> {
        self.scopes()
            .into_iter()
            .flat_map(|scope| self.tuples_for(scope))
            .collect()
    }
}
