//! テスト用の疑似ページ
//!
//! `InteractionFacade` をメモリ上のDOMで実装する。ロケータはXPathを評価せず
//! キーとして扱う。`recreate` した要素の古い参照は `StaleElement` になる。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::aena::locators;
use crate::aena::Grouping;
use crate::error::ScraperError;
use crate::traits::{ElementRef, ElementState, InteractionFacade, Locator};

type Handler = Arc<dyn Fn(&mut FakeDom) + Send + Sync>;

#[derive(Debug, Clone, Default)]
struct Node {
    text: String,
    attrs: HashMap<String, String>,
    props: HashMap<String, String>,
    displayed: bool,
    enabled: bool,
    options: Vec<String>,
    selected: Option<String>,
    children: HashMap<Locator, Vec<u64>>,
    alive: bool,
}

#[derive(Default)]
pub struct FakeDom {
    next_id: u64,
    nodes: HashMap<u64, Node>,
    index: HashMap<Locator, Vec<u64>>,
    /// ロケータに一致させるためにテキストが含むべき文字列
    text_filters: HashMap<Locator, String>,
    opened: Vec<String>,
    actions: Vec<String>,
    selections: Vec<(Locator, String)>,
    handlers: HashMap<String, Handler>,
    /// 描画待ちの検索結果（残り探索回数）
    pending: Option<(usize, FakeResult)>,
    fail_property_writes: bool,
    releases: usize,
}

impl FakeDom {
    fn insert(&mut self, node: Node) -> ElementRef {
        self.next_id += 1;
        let id = self.next_id;
        self.nodes.insert(id, Node { alive: true, ..node });
        ElementRef::new(id)
    }

    pub fn add_element(&mut self, locator: &Locator, text: &str) -> ElementRef {
        let element = self.insert(Node {
            text: text.to_string(),
            displayed: true,
            enabled: true,
            ..Default::default()
        });
        self.index.entry(locator.clone()).or_default().push(element.id());
        element
    }

    pub fn add_select(&mut self, locator: &Locator, options: &[&str]) -> ElementRef {
        let element = self.add_element(locator, "");
        if let Some(node) = self.nodes.get_mut(&element.id()) {
            node.options = options.iter().map(|s| s.to_string()).collect();
        }
        element
    }

    pub fn add_child(&mut self, parent: &ElementRef, locator: &Locator, text: &str) -> ElementRef {
        let child = self.insert(Node {
            text: text.to_string(),
            displayed: true,
            enabled: true,
            ..Default::default()
        });
        if let Some(node) = self.nodes.get_mut(&parent.id()) {
            node.children.entry(locator.clone()).or_default().push(child.id());
        }
        child
    }

    /// 既存要素をすべて `locator` に追加登録する
    pub fn alias(&mut self, element: &ElementRef, locator: &Locator) {
        self.index.entry(locator.clone()).or_default().push(element.id());
    }

    pub fn set_attr(&mut self, element: &ElementRef, name: &str, value: &str) {
        if let Some(node) = self.nodes.get_mut(&element.id()) {
            node.attrs.insert(name.to_string(), value.to_string());
        }
    }

    pub fn set_displayed(&mut self, element: &ElementRef, displayed: bool) {
        if let Some(node) = self.nodes.get_mut(&element.id()) {
            node.displayed = displayed;
        }
    }

    pub fn set_enabled(&mut self, element: &ElementRef, enabled: bool) {
        if let Some(node) = self.nodes.get_mut(&element.id()) {
            node.enabled = enabled;
        }
    }

    pub fn set_text_filter(&mut self, locator: &Locator, needle: &str) {
        self.text_filters.insert(locator.clone(), needle.to_string());
    }

    /// `locator` の要素を取り除く（古い参照は無効になる）
    pub fn remove(&mut self, locator: &Locator) {
        for id in self.index.remove(locator).unwrap_or_default() {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.alive = false;
            }
        }
    }

    /// 再描画：同じ内容で要素を作り直す
    pub fn recreate(&mut self, locator: &Locator) {
        let ids = self.index.remove(locator).unwrap_or_default();
        let mut fresh = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.alive = false;
                let copy = node.clone();
                fresh.push(self.insert(copy).id());
            }
        }
        self.index.insert(locator.clone(), fresh);
    }

    pub fn selected(&self, locator: &Locator) -> Option<String> {
        self.index
            .get(locator)
            .and_then(|ids| ids.first())
            .and_then(|id| self.nodes.get(id))
            .and_then(|n| n.selected.clone())
    }

    fn node(&self, element: &ElementRef) -> Result<&Node, ScraperError> {
        match self.nodes.get(&element.id()) {
            Some(node) if node.alive => Ok(node),
            _ => Err(ScraperError::StaleElement(format!("{:?}", element))),
        }
    }

    fn node_mut(&mut self, element: &ElementRef) -> Result<&mut Node, ScraperError> {
        match self.nodes.get_mut(&element.id()) {
            Some(node) if node.alive => Ok(node),
            _ => Err(ScraperError::StaleElement(format!("{:?}", element))),
        }
    }

    /// 探索1回分の時間経過。描画待ちの結果が期限に達したら描画する
    fn tick(&mut self) {
        let due = match &mut self.pending {
            Some((polls, _)) => {
                *polls = polls.saturating_sub(1);
                *polls == 0
            }
            None => false,
        };
        if due {
            if let Some((_, result)) = self.pending.take() {
                render_results(self, &result);
            }
        }
    }

    fn matches(&self, locator: &Locator) -> Vec<ElementRef> {
        let filter = self.text_filters.get(locator);
        self.index
            .get(locator)
            .map(|ids| {
                ids.iter()
                    .filter(|id| {
                        self.nodes.get(id).is_some_and(|n| {
                            n.alive && filter.map_or(true, |f| n.text.contains(f.as_str()))
                        })
                    })
                    .map(|id| ElementRef::new(*id))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// 疑似ページ
#[derive(Clone, Default)]
pub struct FakePage {
    dom: Arc<Mutex<FakeDom>>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut FakeDom) -> R) -> R {
        let mut dom = self.dom.lock().unwrap();
        f(&mut dom)
    }

    pub fn add_element(&self, locator: &Locator, text: &str) -> ElementRef {
        self.with(|dom| dom.add_element(locator, text))
    }

    pub fn set_displayed(&self, element: &ElementRef, displayed: bool) {
        self.with(|dom| dom.set_displayed(element, displayed))
    }

    /// 名前付きアクション実行時の振る舞いを登録
    pub fn on_action(&self, name: &str, handler: impl Fn(&mut FakeDom) + Send + Sync + 'static) {
        self.with(|dom| {
            dom.handlers.insert(name.to_string(), Arc::new(handler));
        })
    }

    pub fn actions(&self) -> Vec<String> {
        self.with(|dom| dom.actions.clone())
    }

    pub fn opened(&self) -> Vec<String> {
        self.with(|dom| dom.opened.clone())
    }

    pub fn selections(&self) -> Vec<(Locator, String)> {
        self.with(|dom| dom.selections.clone())
    }

    pub fn text(&self, element: &ElementRef) -> Option<String> {
        self.with(|dom| dom.nodes.get(&element.id()).map(|n| n.text.clone()))
    }

    /// 以降のプロパティ書き込みを `StaleElement` で失敗させる
    pub fn fail_property_writes(&self) {
        self.with(|dom| dom.fail_property_writes = true)
    }

    pub fn releases(&self) -> usize {
        self.with(|dom| dom.releases)
    }
}

#[async_trait]
impl InteractionFacade for FakePage {
    /// 入口メニュー以外の要素はすべて破棄される
    async fn open(&self, url: &str) -> Result<(), ScraperError> {
        self.with(|dom| {
            dom.opened.push(url.to_string());
            let landing = [
                Locator::id(locators::CURRENT_MENU_ID),
                Locator::id(locators::HISTORICAL_MENU_ID),
            ];
            let stale: Vec<Locator> = dom
                .index
                .keys()
                .filter(|l| !landing.contains(l))
                .cloned()
                .collect();
            for locator in stale {
                dom.remove(&locator);
            }
        });
        Ok(())
    }

    async fn select_by_visible_label(
        &self,
        control: &ElementRef,
        label: &str,
    ) -> Result<(), ScraperError> {
        self.with(|dom| {
            let locator = dom
                .index
                .iter()
                .find(|(_, ids)| ids.contains(&control.id()))
                .map(|(l, _)| l.clone());
            let node = dom.node_mut(control)?;
            if !node.options.iter().any(|o| o == label) {
                return Err(ScraperError::OptionNotFound {
                    control: locator.as_ref().map(|l| l.to_string()).unwrap_or_default(),
                    label: label.to_string(),
                });
            }
            node.selected = Some(label.to_string());
            if let Some(locator) = locator {
                dom.selections.push((locator, label.to_string()));
            }
            Ok(())
        })
    }

    async fn option_labels(&self, control: &ElementRef) -> Result<Vec<String>, ScraperError> {
        self.with(|dom| Ok(dom.node(control)?.options.clone()))
    }

    async fn invoke_named_action(&self, name: &str) -> Result<(), ScraperError> {
        let mut dom = self.dom.lock().unwrap();
        dom.actions.push(name.to_string());
        if let Some(handler) = dom.handlers.get(name).cloned() {
            handler(&mut *dom);
        }
        Ok(())
    }

    async fn find_one(&self, locator: &Locator) -> Result<ElementRef, ScraperError> {
        self.with(|dom| {
            dom.tick();
            dom.matches(locator)
                .into_iter()
                .next()
                .ok_or_else(|| ScraperError::ElementNotFound(locator.to_string()))
        })
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<ElementRef>, ScraperError> {
        self.with(|dom| {
            dom.tick();
            Ok(dom.matches(locator))
        })
    }

    async fn find_all_within(
        &self,
        parent: &ElementRef,
        locator: &Locator,
    ) -> Result<Vec<ElementRef>, ScraperError> {
        self.with(|dom| {
            let node = dom.node(parent)?;
            Ok(node
                .children
                .get(locator)
                .map(|ids| ids.iter().map(|id| ElementRef::new(*id)).collect())
                .unwrap_or_default())
        })
    }

    async fn text_of(&self, element: &ElementRef) -> Result<String, ScraperError> {
        self.with(|dom| Ok(dom.node(element)?.text.clone()))
    }

    async fn attribute_of(&self, element: &ElementRef, name: &str) -> Result<String, ScraperError> {
        self.with(|dom| {
            let node = dom.node(element)?;
            Ok(node
                .attrs
                .get(name)
                .or_else(|| node.props.get(name))
                .cloned()
                .unwrap_or_else(|| match name {
                    "textContent" => node.text.clone(),
                    _ => String::new(),
                }))
        })
    }

    async fn element_state(&self, element: &ElementRef) -> Result<ElementState, ScraperError> {
        self.with(|dom| {
            let node = dom.node(element)?;
            Ok(ElementState {
                displayed: node.displayed,
                enabled: node.enabled,
            })
        })
    }

    async fn set_property(
        &self,
        element: &ElementRef,
        name: &str,
        value: &str,
    ) -> Result<(), ScraperError> {
        self.with(|dom| {
            if dom.fail_property_writes {
                return Err(ScraperError::StaleElement(format!("{:?}", element)));
            }
            let node = dom.node_mut(element)?;
            if name == "innerText" || name == "textContent" {
                node.text = value.to_string();
            }
            node.props.insert(name.to_string(), value.to_string());
            Ok(())
        })
    }

    async fn release_elements(&self) -> Result<(), ScraperError> {
        self.with(|dom| dom.releases += 1);
        Ok(())
    }
}

/// 検索結果の描画内容
#[derive(Debug, Clone, Default)]
pub struct FakeResult {
    pub count: u32,
    /// 例: `"Total Ene Feb"`
    pub header: String,
    /// 各行のセル（先頭は航空会社名、空文字は空セル）
    pub rows: Vec<Vec<String>>,
    pub echo: String,
    /// 合計行を描画しない（描画途中の再現）
    pub without_total: bool,
    /// 検索後この回数だけ探索されるまで前回の表示を残す
    pub render_after: usize,
}

impl FakeResult {
    pub fn new(count: u32, header: &str, echo: &str) -> Self {
        Self {
            count,
            header: header.to_string(),
            echo: echo.to_string(),
            ..Default::default()
        }
    }

    pub fn row(mut self, cells: &[&str]) -> Self {
        self.rows.push(cells.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn rendered_after(mut self, polls: usize) -> Self {
        self.render_after = polls;
        self
    }
}

/// AENA ページの骨組み（入口メニューと検索フォーム）を用意する
pub fn scaffold_page(page: &FakePage, airports: &[&str], movements: &[&str], years: &[&str]) {
    let airports: Vec<String> = airports.iter().map(|s| s.to_string()).collect();
    let movements: Vec<String> = movements.iter().map(|s| s.to_string()).collect();
    let years: Vec<String> = years.iter().map(|s| s.to_string()).collect();

    page.with(|dom| {
        dom.add_select(&Locator::id(locators::CURRENT_MENU_ID), &["1. Pasajeros", "2. Operaciones"]);
        dom.add_select(&Locator::id(locators::HISTORICAL_MENU_ID), &["1. Pasajeros", "2. Operaciones"]);
    });

    let form = move |dom: &mut FakeDom, with_years: bool| {
        let with_all = |v: &[String]| -> Vec<String> {
            std::iter::once("TODOS".to_string()).chain(v.iter().cloned()).collect()
        };
        for locator in [
            locators::search_button(),
            locators::statistic_select(),
            locators::grouping_select(),
            locators::airport_select(),
            locators::movement_select(),
            locators::year_select(),
        ] {
            dom.remove(&locator);
        }
        dom.add_element(&locators::search_button(), "Buscar");
        dom.add_select(&locators::statistic_select(), &["1. Pasajeros", "2. Operaciones"]);
        dom.add_select(&locators::grouping_select(), &["NOMBRE COMPAÑIA", "PAIS"]);
        let a = with_all(&airports);
        dom.add_select(&locators::airport_select(), &a.iter().map(String::as_str).collect::<Vec<_>>());
        let m = with_all(&movements);
        dom.add_select(&locators::movement_select(), &m.iter().map(String::as_str).collect::<Vec<_>>());
        if with_years {
            dom.add_select(&locators::year_select(), &years.iter().map(String::as_str).collect::<Vec<_>>());
        }
    };
    let form = Arc::new(form);

    let current = form.clone();
    page.on_action(locators::CURRENT_MENU_ACTION, move |dom| (*current)(dom, false));
    page.on_action(locators::HISTORICAL_MENU_ACTION, move |dom| (*form)(dom, true));
}

/// 検索時に `results` を先頭から順に描画する
pub fn script_searches(page: &FakePage, results: Vec<FakeResult>) {
    let queue = Arc::new(Mutex::new(results.into_iter()));
    page.on_action(locators::SEARCH_ACTION, move |dom| {
        let next = queue.lock().unwrap().next();
        match next {
            Some(result) if result.render_after > 0 => {
                dom.pending = Some((result.render_after, result));
            }
            Some(result) => render_results(dom, &result),
            None => {}
        }
    });
}

/// 検索結果を描画する（前回の結果は破棄、セレクトは作り直す）
pub fn render_results(dom: &mut FakeDom, result: &FakeResult) {
    let grouping = Grouping::ByAirline;
    let count = locators::result_count();
    let rows = locators::data_rows(grouping);
    let total = locators::total_row(grouping);
    let header = locators::header_row(crate::aena::StatisticType::Passengers);
    let echo = locators::echo_cell();

    for locator in [&count, &rows, &total, &header, &echo] {
        dom.remove(locator);
    }
    dom.recreate(&locators::airport_select());
    dom.recreate(&locators::movement_select());

    dom.set_text_filter(&count, locators::RESULT_COUNT_TEXT);
    dom.add_element(&count, &format!("{} {}", result.count, locators::RESULT_COUNT_TEXT));
    dom.add_element(&echo, &result.echo);

    if result.count == 0 {
        return;
    }

    dom.add_element(&header, &result.header);
    let cells = locators::row_cells();
    for row in &result.rows {
        let airline = row.first().cloned().unwrap_or_default();
        let tr = dom.add_element(&rows, "");
        dom.set_attr(&tr, "id", &format!("{}{}", grouping.row_id_prefix(), airline));
        for cell in row {
            dom.add_child(&tr, &cells, cell);
        }
    }

    if !result.without_total {
        let tr = dom.add_element(&rows, "");
        dom.set_attr(&tr, "id", &format!("{}Total", grouping.row_id_prefix()));
        dom.add_child(&tr, &cells, "Total");
        dom.alias(&tr, &total);
    }
}
