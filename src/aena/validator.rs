//! リモートが復唱した検索条件の照合
//!
//! 不一致はエラーにせず [`Discrepancy`] として返す。

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::warn;

use super::types::{QueryParameters, QueryScope};

pub const KEY_MOVEMENT: &str = "Movimiento";
pub const KEY_AIRPORT: &str = "Aeropuerto Base";
pub const KEY_QUERY: &str = "CONSULTA";

/// 過去年の復唱に含まれる年ラベル（コロンが分割を壊すので先に除去する）
const YEAR_LABEL: &str = "Año:";

/// 復唱された検索条件
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseEcho {
    params: BTreeMap<String, String>,
}

impl ResponseEcho {
    /// `"Clave: valor, Clave: valor"` 形式を解析
    ///
    /// コロンを含まない項目は読み飛ばす。
    pub fn parse(text: &str) -> Self {
        let cleaned = text.replace(YEAR_LABEL, "");
        let params = cleaned
            .split(',')
            .filter_map(|item| item.split_once(':'))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();
        Self { params }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn movement(&self) -> Option<&str> {
        self.get(KEY_MOVEMENT)
    }

    pub fn airport(&self) -> Option<&str> {
        self.get(KEY_AIRPORT)
    }

    pub fn query(&self) -> Option<&str> {
        self.get(KEY_QUERY)
    }
}

/// データ品質上の不一致（処理は止めない）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Discrepancy {
    ResultCountMismatch {
        reported: u32,
        extracted: usize,
    },
    ParameterMismatch {
        field: String,
        requested: String,
        reported: Option<String>,
    },
    ClassificationMismatch {
        expected: String,
        reported: Option<String>,
    },
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discrepancy::ResultCountMismatch { reported, extracted } => write!(
                f,
                "検索結果の件数 ({}) と取得行数 ({}) が一致しません",
                reported, extracted
            ),
            Discrepancy::ParameterMismatch {
                field,
                requested,
                reported,
            } => write!(
                f,
                "{}: 要求 '{}' / 応答 '{}'",
                field,
                requested,
                reported.as_deref().unwrap_or("-")
            ),
            Discrepancy::ClassificationMismatch { expected, reported } => write!(
                f,
                "CONSULTA: 期待 '{}' / 応答 '{}'",
                expected,
                reported.as_deref().unwrap_or("-")
            ),
        }
    }
}

/// 復唱・件数を要求と照合し、不一致を列挙する
pub fn validate(
    echo: &ResponseEcho,
    requested: &QueryParameters,
    extracted_count: usize,
    reported_count: u32,
) -> Vec<Discrepancy> {
    let mut discrepancies = Vec::new();

    if extracted_count != reported_count as usize {
        discrepancies.push(Discrepancy::ResultCountMismatch {
            reported: reported_count,
            extracted: extracted_count,
        });
    }

    let checks = [
        (KEY_MOVEMENT, requested.movement.label(), echo.movement()),
        (KEY_AIRPORT, requested.airport.as_str(), echo.airport()),
    ];
    for (field, wanted, got) in checks {
        if got != Some(wanted) {
            discrepancies.push(Discrepancy::ParameterMismatch {
                field: field.to_string(),
                requested: wanted.to_string(),
                reported: got.map(str::to_string),
            });
        }
    }

    if !classification_matches(requested.scope(), echo.query()) {
        discrepancies.push(Discrepancy::ClassificationMismatch {
            expected: expected_classification(requested.scope()),
            reported: echo.query().map(str::to_string),
        });
    }

    for d in &discrepancies {
        warn!(%requested, "{}", d);
    }

    discrepancies
}

fn expected_classification(scope: QueryScope) -> String {
    match scope {
        QueryScope::CurrentYear => "Datos Provisionales".to_string(),
        QueryScope::HistoricalYear(year) => format!("{} - Datos Definitivos", year),
    }
}

/// 当年は暫定データ、過去年はその年の確定データであること
fn classification_matches(scope: QueryScope, query: Option<&str>) -> bool {
    let Some(query) = query else {
        return false;
    };
    let query = query.to_lowercase();
    match scope {
        QueryScope::CurrentYear => query.contains("provisional"),
        QueryScope::HistoricalYear(year) => {
            query.contains(&year.to_string()) && query.contains("definitiv")
        }
    }
}
