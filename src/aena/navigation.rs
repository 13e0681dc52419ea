//! 入口ページからクエリ可能状態までの遷移

use tracing::{debug, info};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::poll::{wait_until, WaitCondition};
use crate::traits::{InteractionFacade, Locator};

use super::locators;
use super::types::{Grouping, QueryScope, StatisticType};

/// クエリ可能状態に到達した証明
///
/// [`NavigationController::prepare_query_context`] からのみ得られる。
#[derive(Debug)]
pub struct ReadyHandle {
    scope: QueryScope,
    statistic: StatisticType,
    grouping: Grouping,
}

impl ReadyHandle {
    pub fn scope(&self) -> QueryScope {
        self.scope
    }

    pub fn statistic(&self) -> StatisticType {
        self.statistic
    }

    pub fn grouping(&self) -> Grouping {
        self.grouping
    }
}

pub struct NavigationController<'a> {
    facade: &'a dyn InteractionFacade,
    config: &'a ScraperConfig,
}

impl<'a> NavigationController<'a> {
    pub fn new(facade: &'a dyn InteractionFacade, config: &'a ScraperConfig) -> Self {
        Self { facade, config }
    }

    /// `scope` に応じた入口から統計を開き、検索可能になるまで待つ
    ///
    /// 明示的な読み込み完了イベントはないため、検索リンクがクリック可能になった
    /// 時点を準備完了とみなす。上限内に到達しなければ `NavigationTimeout`。
    pub async fn prepare_query_context(
        &self,
        scope: QueryScope,
        statistic: StatisticType,
        grouping: Grouping,
    ) -> Result<ReadyHandle, ScraperError> {
        info!(%scope, "Navigating to query page...");

        self.facade.open(&self.config.base_url).await?;
        debug!("Landing page loaded: {}", self.config.base_url);

        let (menu_id, action) = match scope {
            QueryScope::CurrentYear => (locators::CURRENT_MENU_ID, locators::CURRENT_MENU_ACTION),
            QueryScope::HistoricalYear(_) => {
                (locators::HISTORICAL_MENU_ID, locators::HISTORICAL_MENU_ACTION)
            }
        };

        // 入口メニューは読み込み完了前には存在しない
        let menu = wait_until(
            self.facade,
            &WaitCondition::Present(Locator::id(menu_id)),
            self.config.navigation_timeout,
            self.config.poll_interval,
        )
        .await
        .map_err(|e| navigation_timeout(scope, e))?;
        self.facade
            .select_by_visible_label(&menu, statistic.label())
            .await?;
        self.facade.invoke_named_action(action).await?;

        wait_until(
            self.facade,
            &WaitCondition::Clickable(locators::search_button()),
            self.config.navigation_timeout,
            self.config.poll_interval,
        )
        .await
        .map_err(|e| navigation_timeout(scope, e))?;
        debug!(%scope, "Search button is clickable");

        self.select(&locators::statistic_select(), statistic.label()).await?;
        self.select(&locators::grouping_select(), grouping.label()).await?;

        if let QueryScope::HistoricalYear(year) = scope {
            self.select(&locators::year_select(), &year.to_string()).await?;
        }

        info!(%scope, "Query page ready");
        Ok(ReadyHandle {
            scope,
            statistic,
            grouping,
        })
    }

    async fn select(&self, locator: &Locator, label: &str) -> Result<(), ScraperError> {
        let control = self.facade.find_one(locator).await?;
        self.facade.select_by_visible_label(&control, label).await
    }
}

fn navigation_timeout(scope: QueryScope, err: ScraperError) -> ScraperError {
    match err {
        ScraperError::Timeout(msg) => ScraperError::NavigationTimeout(format!("{}: {}", scope, msg)),
        other => other,
    }
}

/// セレクトの選択肢（先頭の「全て」を除く）
pub async fn available_options(
    facade: &dyn InteractionFacade,
    locator: &Locator,
) -> Result<Vec<String>, ScraperError> {
    let control = facade.find_one(locator).await?;
    let labels = facade.option_labels(&control).await?;
    Ok(labels.into_iter().skip(1).collect())
}

/// 当年の検索画面を開き、選択可能な空港の一覧を返す
pub async fn discover_airports(
    facade: &dyn InteractionFacade,
    config: &ScraperConfig,
) -> Result<Vec<String>, ScraperError> {
    NavigationController::new(facade, config)
        .prepare_query_context(
            QueryScope::CurrentYear,
            StatisticType::Passengers,
            Grouping::ByAirline,
        )
        .await?;
    let airports = available_options(facade, &locators::airport_select()).await?;
    info!("Discovered {} airports", airports.len());
    Ok(airports)
}
