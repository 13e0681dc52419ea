//! 有界ポーリング
//!
//! リモートには完了イベントがないため、観測可能な状態に対する述語が
//! 成立するまでポーリングする。述語は純粋関数で、単体でテストできる。

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::error::ScraperError;
use crate::traits::{ElementRef, ElementState, InteractionFacade, Locator};

/// 待機条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitCondition {
    Present(Locator),
    Visible(Locator),
    /// 表示されていて操作可能
    Clickable(Locator),
}

impl WaitCondition {
    pub fn locator(&self) -> &Locator {
        match self {
            WaitCondition::Present(l) | WaitCondition::Visible(l) | WaitCondition::Clickable(l) => l,
        }
    }

    /// `state` は要素が見つからなければ `None`
    pub fn is_met(&self, state: Option<&ElementState>) -> bool {
        match (self, state) {
            (_, None) => false,
            (WaitCondition::Present(_), Some(_)) => true,
            (WaitCondition::Visible(_), Some(s)) => s.displayed,
            (WaitCondition::Clickable(_), Some(s)) => s.displayed && s.enabled,
        }
    }
}

/// 条件が成立するまで待機し、一致した要素を返す
///
/// `timeout` を超えたら `ScraperError::Timeout`。探索中のエラー（再描画による
/// 参照切れなど）は「未成立」として扱い、ポーリングを続ける。
pub async fn wait_until(
    facade: &dyn InteractionFacade,
    condition: &WaitCondition,
    timeout: Duration,
    interval: Duration,
) -> Result<ElementRef, ScraperError> {
    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match observe(facade, condition.locator()).await {
            Ok(Some((element, state))) if condition.is_met(Some(&state)) => {
                debug!(
                    locator = %condition.locator(),
                    attempts,
                    "Condition met after {:?}",
                    start.elapsed()
                );
                return Ok(element);
            }
            Ok(_) => {}
            Err(e) => debug!(locator = %condition.locator(), "Poll check error: {}", e),
        }

        if start.elapsed() >= timeout {
            return Err(ScraperError::Timeout(format!(
                "{:?} が{:?}以内に成立しませんでした",
                condition, timeout
            )));
        }

        sleep(interval).await;
    }
}

async fn observe(
    facade: &dyn InteractionFacade,
    locator: &Locator,
) -> Result<Option<(ElementRef, ElementState)>, ScraperError> {
    match facade.find_one(locator).await {
        Ok(element) => {
            let state = facade.element_state(&element).await?;
            Ok(Some((element, state)))
        }
        Err(ScraperError::ElementNotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}
