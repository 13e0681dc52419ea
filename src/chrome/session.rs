//! chromiumoxide による `InteractionFacade` 実装
//!
//! ロケータはページ内JavaScriptで解決し、見つかったノードを
//! `window.__aenaRefs`（`Map`）にセッション内で一意なIDで登録する。
//! IDはページを開き直しても再利用しないので、別文書の要素や
//! 再描画で切り離されたノードを参照すると `StaleElement` になる。

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::js::EvaluationResult;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::traits::{ElementRef, ElementState, InteractionFacade, Locator};

const REGISTRY: &str = "(window.__aenaRefs = window.__aenaRefs || new Map())";

/// 1回の探索で予約するIDの数（1回に登録できるノード数の上限）
const REF_BLOCK: u64 = 1 << 16;

/// 要素操作の応答（参照切れを区別する）
#[derive(Debug, Deserialize)]
struct Reply<T> {
    stale: bool,
    value: Option<T>,
}

#[derive(Debug, Deserialize)]
struct FoundRef {
    id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SelectReply {
    found: bool,
    control: String,
}

pub struct ChromeSession {
    config: ScraperConfig,
    browser: Option<Browser>,
    page: Option<Page>,
    next_ref: AtomicU64,
}

impl ChromeSession {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            config,
            browser: None,
            page: None,
            next_ref: AtomicU64::new(0),
        }
    }

    /// ブラウザを起動して空のページを開く
    pub async fn initialize(&mut self) -> Result<(), ScraperError> {
        info!("Initializing browser...");

        // ユニークなユーザーデータディレクトリを生成
        let unique_id = format!(
            "{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );
        let user_data_dir = std::env::temp_dir().join(format!("aena-{}", unique_id));

        let mut builder = BrowserConfig::builder()
            .chrome_executable(self.config.resolve_chrome_path())
            .user_data_dir(&user_data_dir)
            .window_size(1280, 1024);

        if !self.config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .no_sandbox()
            .request_timeout(self.config.request_timeout)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");

        if self.config.debug {
            builder = builder.arg("--enable-logging=stderr").arg("--v=1");
        }

        let browser_config = builder
            .build()
            .map_err(|e| ScraperError::BrowserInit(format!("ブラウザ設定エラー: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        // ブラウザイベントハンドラをバックグラウンドで実行
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                debug!("Browser event: {:?}", event);
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        self.browser = Some(browser);
        self.page = Some(page);

        info!("Browser initialized successfully");
        Ok(())
    }

    /// ブラウザを閉じる
    pub async fn close(&mut self) -> Result<(), ScraperError> {
        info!("Closing browser...");
        self.page = None;
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                debug!("Failed to close browser: {}", e);
            }
            if let Err(e) = browser.wait().await {
                debug!("Failed to wait for browser exit: {}", e);
            }
        }
        Ok(())
    }

    fn page(&self) -> Result<&Page, ScraperError> {
        self.page
            .as_ref()
            .ok_or_else(|| ScraperError::BrowserInit("ブラウザが初期化されていません".into()))
    }

    async fn evaluate(&self, script: &str) -> Result<EvaluationResult, ScraperError> {
        self.page()?
            .evaluate(script)
            .await
            .map_err(|e| ScraperError::JavaScript(e.to_string()))
    }

    async fn eval<T: DeserializeOwned>(&self, script: &str) -> Result<T, ScraperError> {
        Ok(self.evaluate(script).await?.into_value::<T>()?)
    }

    /// 新しいIDの範囲を予約し、その先頭を返す
    fn reserve_refs(&self) -> u64 {
        self.next_ref.fetch_add(REF_BLOCK, Ordering::Relaxed)
    }

    /// `el` を束縛して `body` を評価する
    async fn eval_on<T: DeserializeOwned>(
        &self,
        element: &ElementRef,
        body: &str,
    ) -> Result<Option<T>, ScraperError> {
        let script = format!(
            r#"
            (() => {{
                const refs = {registry};
                const el = refs.get({id});
                if (!el || !el.isConnected) return {{ stale: true, value: null }};
                return {{ stale: false, value: ({body}) }};
            }})()
            "#,
            registry = REGISTRY,
            id = element.id(),
            body = body,
        );
        let reply: Reply<T> = self.eval(&script).await?;
        if reply.stale {
            return Err(ScraperError::StaleElement(format!("{:?}", element)));
        }
        Ok(reply.value)
    }
}

/// JavaScript の文字列リテラル
fn js_str(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// `nodes` を `base` からの連番で `refs` に登録し、ID配列を返す式
fn register_nodes(nodes: &str, base: u64) -> String {
    format!(
        r#"(() => {{
            const nodes = {nodes};
            if (nodes.length > {block}) throw new Error('too many nodes: ' + nodes.length);
            return nodes.map((n, i) => (refs.set({base} + i, n), {base} + i));
        }})()"#,
        nodes = nodes,
        block = REF_BLOCK,
        base = base,
    )
}

/// `find_one` の応答を解釈する（一致なしは `ElementNotFound`）
fn found_ref(result: &EvaluationResult, locator: &Locator) -> Result<ElementRef, ScraperError> {
    let found: FoundRef = match result.value() {
        None | Some(serde_json::Value::Null) => FoundRef { id: None },
        Some(value) => serde_json::from_value(value.clone())?,
    };
    found
        .id
        .map(ElementRef::new)
        .ok_or_else(|| ScraperError::ElementNotFound(locator.to_string()))
}

/// `context` を起点にロケータに一致するノード配列を返す式
fn resolve_nodes(locator: &Locator, context: &str) -> String {
    match locator {
        Locator::Id(id) => format!(
            "[({context}).querySelector('#' + CSS.escape({id}))].filter(Boolean)",
            context = context,
            id = js_str(id),
        ),
        Locator::XPath(xpath) => format!(
            r#"(() => {{
                const r = document.evaluate({xpath}, {context}, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
                const out = [];
                for (let i = 0; i < r.snapshotLength; i++) out.push(r.snapshotItem(i));
                return out;
            }})()"#,
            xpath = js_str(xpath),
            context = context,
        ),
    }
}

#[async_trait]
impl InteractionFacade for ChromeSession {
    async fn open(&self, url: &str) -> Result<(), ScraperError> {
        let page = self.page()?;
        page.goto(url)
            .await
            .map_err(|e| ScraperError::Navigation(e.to_string()))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| ScraperError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn select_by_visible_label(
        &self,
        control: &ElementRef,
        label: &str,
    ) -> Result<(), ScraperError> {
        let body = format!(
            r#"((el) => {{
                const opt = Array.from(el.options || []).find(o => o.text.trim() === {label});
                const control = el.title || el.id || el.name || '';
                if (!opt) return {{ found: false, control }};
                el.value = opt.value;
                opt.selected = true;
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return {{ found: true, control }};
            }})(el)"#,
            label = js_str(label),
        );
        let reply: Option<SelectReply> = self.eval_on(control, &body).await?;
        match reply {
            Some(r) if r.found => Ok(()),
            Some(r) => Err(ScraperError::OptionNotFound {
                control: r.control,
                label: label.to_string(),
            }),
            None => Err(ScraperError::JavaScript("選択結果が取得できません".into())),
        }
    }

    async fn option_labels(&self, control: &ElementRef) -> Result<Vec<String>, ScraperError> {
        let labels: Option<Vec<String>> = self
            .eval_on(control, "Array.from(el.options || []).map(o => o.text.trim())")
            .await?;
        Ok(labels.unwrap_or_default())
    }

    async fn invoke_named_action(&self, name: &str) -> Result<(), ScraperError> {
        let script = format!(
            r#"(() => {{
                const fn = window[{name}];
                if (typeof fn !== 'function') return false;
                fn();
                return true;
            }})()"#,
            name = js_str(name),
        );
        let invoked: bool = self.eval(&script).await?;
        if !invoked {
            return Err(ScraperError::JavaScript(format!("関数 {}() が見つかりません", name)));
        }
        debug!("Invoked {}()", name);
        Ok(())
    }

    async fn find_one(&self, locator: &Locator) -> Result<ElementRef, ScraperError> {
        // null をそのまま返すと評価結果に値が残らないので、必ずオブジェクトで包む
        let script = format!(
            "(() => {{ const refs = {registry}; const n = {nodes}[0]; return {{ id: n ? (refs.set({id}, n), {id}) : null }}; }})()",
            registry = REGISTRY,
            nodes = resolve_nodes(locator, "document"),
            id = self.reserve_refs(),
        );
        let result = self.evaluate(&script).await?;
        found_ref(&result, locator)
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<ElementRef>, ScraperError> {
        let script = format!(
            "(() => {{ const refs = {}; return {}; }})()",
            REGISTRY,
            register_nodes(&resolve_nodes(locator, "document"), self.reserve_refs()),
        );
        let ids: Vec<u64> = self.eval(&script).await?;
        Ok(ids.into_iter().map(ElementRef::new).collect())
    }

    async fn find_all_within(
        &self,
        parent: &ElementRef,
        locator: &Locator,
    ) -> Result<Vec<ElementRef>, ScraperError> {
        let body = register_nodes(&resolve_nodes(locator, "el"), self.reserve_refs());
        let ids: Option<Vec<u64>> = self.eval_on(parent, &body).await?;
        Ok(ids
            .unwrap_or_default()
            .into_iter()
            .map(ElementRef::new)
            .collect())
    }

    async fn text_of(&self, element: &ElementRef) -> Result<String, ScraperError> {
        let text: Option<String> = self
            .eval_on(element, "(el.innerText || '').trim()")
            .await?;
        Ok(text.unwrap_or_default())
    }

    async fn attribute_of(&self, element: &ElementRef, name: &str) -> Result<String, ScraperError> {
        let body = format!(
            "el.getAttribute({name}) ?? (el[{name}] != null ? String(el[{name}]) : '')",
            name = js_str(name),
        );
        let value: Option<String> = self.eval_on(element, &body).await?;
        Ok(value.unwrap_or_default())
    }

    async fn element_state(&self, element: &ElementRef) -> Result<ElementState, ScraperError> {
        let body = r#"({
            displayed: !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length)
                && getComputedStyle(el).visibility !== 'hidden',
            enabled: !el.disabled
        })"#;
        #[derive(Deserialize)]
        struct State {
            displayed: bool,
            enabled: bool,
        }
        let state: Option<State> = self.eval_on(element, body).await?;
        Ok(state
            .map(|s| ElementState {
                displayed: s.displayed,
                enabled: s.enabled,
            })
            .unwrap_or_default())
    }

    async fn set_property(
        &self,
        element: &ElementRef,
        name: &str,
        value: &str,
    ) -> Result<(), ScraperError> {
        let body = format!(
            "(el[{name}] = {value}, true)",
            name = js_str(name),
            value = js_str(value),
        );
        let _: Option<bool> = self.eval_on(element, &body).await?;
        Ok(())
    }

    async fn release_elements(&self) -> Result<(), ScraperError> {
        let _: bool = self
            .eval("(() => { const r = window.__aenaRefs; if (r) r.clear(); return true; })()")
            .await?;
        Ok(())
    }

    async fn capture_debug_snapshot(&self, label: &str) {
        if !self.config.debug {
            return;
        }
        let Ok(page) = self.page() else {
            return;
        };
        match page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
        {
            Ok(screenshot) => {
                use base64::Engine;
                let encoded = base64::engine::general_purpose::STANDARD.encode(&screenshot);
                debug!("Screenshot [{}]: data:image/png;base64,{}", label, encoded);
            }
            Err(e) => warn!("Failed to capture screenshot [{}]: {}", label, e),
        }
    }
}
