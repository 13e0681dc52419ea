use std::fmt;

use async_trait::async_trait;

use crate::error::ScraperError;

/// 要素の探索方法
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Id(String),
    XPath(String),
}

impl Locator {
    pub fn id(id: impl Into<String>) -> Self {
        Locator::Id(id.into())
    }

    pub fn xpath(xpath: impl Into<String>) -> Self {
        Locator::XPath(xpath.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Id(id) => write!(f, "#{}", id),
            Locator::XPath(xpath) => f.write_str(xpath),
        }
    }
}

/// 解決済み要素への不透明な参照
///
/// リモートは描画のたびにコントロールを作り直すため、クエリ境界を越えて保持しないこと。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementRef(u64);

impl ElementRef {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// ポーリング判定に使う観測可能な要素状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ElementState {
    pub displayed: bool,
    pub enabled: bool,
}

/// ブラウザ操作の抽象化
///
/// パイプラインはこのトレイト経由でのみブラウザに触れる。
#[async_trait]
pub trait InteractionFacade: Send + Sync {
    /// URLを開く
    async fn open(&self, url: &str) -> Result<(), ScraperError>;

    /// セレクトの選択肢を表示ラベルで選択（なければ `OptionNotFound`）
    async fn select_by_visible_label(
        &self,
        control: &ElementRef,
        label: &str,
    ) -> Result<(), ScraperError>;

    /// セレクトの選択肢ラベル一覧
    async fn option_labels(&self, control: &ElementRef) -> Result<Vec<String>, ScraperError>;

    /// ページ上の名前付きアクション（JavaScript関数）を実行
    async fn invoke_named_action(&self, name: &str) -> Result<(), ScraperError>;

    async fn find_one(&self, locator: &Locator) -> Result<ElementRef, ScraperError>;

    async fn find_all(&self, locator: &Locator) -> Result<Vec<ElementRef>, ScraperError>;

    /// `parent` 配下で検索（XPathは `parent` を文脈ノードとして評価）
    async fn find_all_within(
        &self,
        parent: &ElementRef,
        locator: &Locator,
    ) -> Result<Vec<ElementRef>, ScraperError>;

    /// 表示テキスト
    async fn text_of(&self, element: &ElementRef) -> Result<String, ScraperError>;

    /// 属性値（属性がなければ同名プロパティ、それもなければ空文字）
    async fn attribute_of(&self, element: &ElementRef, name: &str) -> Result<String, ScraperError>;

    async fn element_state(&self, element: &ElementRef) -> Result<ElementState, ScraperError>;

    /// プロパティを書き換える
    async fn set_property(
        &self,
        element: &ElementRef,
        name: &str,
        value: &str,
    ) -> Result<(), ScraperError>;

    /// これまでに返した `ElementRef` をすべて手放す
    ///
    /// 以降、手放した参照を使うと `StaleElement` になる。
    async fn release_elements(&self) -> Result<(), ScraperError> {
        Ok(())
    }

    /// 失敗時の調査用スナップショット（デフォルトは何もしない）
    async fn capture_debug_snapshot(&self, _label: &str) {}
}
