//! AENA 統計ページの要素ロケータとアクション名

use crate::traits::Locator;

use super::types::{Grouping, StatisticType};

/// 当年統計の入口メニュー
pub const CURRENT_MENU_ID: &str = "estadoactual";
pub const CURRENT_MENU_ACTION: &str = "abrirEnlaceComboestadoactual";

/// 過去年統計の入口メニュー
pub const HISTORICAL_MENU_ID: &str = "historico";
pub const HISTORICAL_MENU_ACTION: &str = "abrirEnlaceCombohistorico";

pub const SEARCH_ACTION: &str = "buscar";

/// 結果件数セルを消費済みにするための文言
pub const CONSUMED_MARKER_TEXT: &str = "Iniciando nueva busqueda...";

pub const RESULT_COUNT_TEXT: &str = "resultados encontrados";

/// 検索リンク（準備完了の判定に使う）
pub fn search_button() -> Locator {
    Locator::xpath("//a[@href ='javascript:buscar();']")
}

pub fn statistic_select() -> Locator {
    Locator::id("dssid")
}

pub fn grouping_select() -> Locator {
    Locator::xpath("//select[@id='selectObjetos'][@title='Agrupación']")
}

/// `selectElementos` 群のうち `title` で識別されるもの
pub fn element_select(title: &str) -> Locator {
    Locator::xpath(format!("//select[@id='selectElementos'][@title='{}']", title))
}

pub fn airport_select() -> Locator {
    element_select("Aeropuerto Base")
}

pub fn movement_select() -> Locator {
    element_select("Movimiento")
}

pub fn year_select() -> Locator {
    element_select("Año")
}

pub fn result_count() -> Locator {
    Locator::xpath(format!("//td[contains(text(),'{}')]", RESULT_COUNT_TEXT))
}

pub fn total_row(grouping: Grouping) -> Locator {
    Locator::xpath(format!(
        "//tr[starts-with(@id,'{}')]",
        grouping.total_row_id_prefix()
    ))
}

/// データ行（合計行も一致する）
pub fn data_rows(grouping: Grouping) -> Locator {
    Locator::xpath(format!("//tr[starts-with(@id,'{}')]", grouping.row_id_prefix()))
}

/// マーカーセルを含む行の次の行
pub fn header_row(statistic: StatisticType) -> Locator {
    Locator::xpath(format!(
        "//tr/td[text()='{}']/../following-sibling::tr",
        statistic.marker()
    ))
}

pub fn row_cells() -> Locator {
    Locator::xpath("./td")
}

pub fn echo_cell() -> Locator {
    Locator::xpath("//td[starts-with(text(),'CONSULTA:')]")
}
