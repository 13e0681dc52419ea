use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("ブラウザ初期化エラー: {0}")]
    BrowserInit(String),

    #[error("ナビゲーションエラー: {0}")]
    Navigation(String),

    #[error("クエリ準備タイムアウト: {0}")]
    NavigationTimeout(String),

    #[error("検索タイムアウト: {0}")]
    SearchTimeout(String),

    #[error("選択肢が見つかりません: {control} に '{label}' がありません")]
    OptionNotFound { control: String, label: String },

    #[error("数値変換エラー: {column} = '{value}'")]
    MalformedNumber { column: String, value: String },

    #[error("タイムアウト: {0}")]
    Timeout(String),

    #[error("要素が見つかりません: {0}")]
    ElementNotFound(String),

    #[error("要素が古くなっています（再描画済み）: {0}")]
    StaleElement(String),

    #[error("JavaScript実行エラー: {0}")]
    JavaScript(String),

    #[error("JSONエラー: {0}")]
    Json(#[from] serde_json::Error),

    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ファイル操作エラー: {0}")]
    FileIO(#[from] std::io::Error),

    #[error("CSV出力エラー: {0}")]
    Csv(#[from] csv::Error),
}

impl ScraperError {
    /// 現在のクエリタプルだけを中断し、次のタプルへ進めるエラーか
    ///
    /// ブラウザ起動・設定・ファイル出力のエラーは実行全体に関わるため `false`。
    pub fn is_tuple_fatal(&self) -> bool {
        !matches!(
            self,
            ScraperError::BrowserInit(_)
                | ScraperError::Config(_)
                | ScraperError::FileIO(_)
                | ScraperError::Csv(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuple_fatal_classification() {
        assert!(ScraperError::SearchTimeout("x".into()).is_tuple_fatal());
        assert!(ScraperError::OptionNotFound {
            control: "Aeropuerto Base".into(),
            label: "LA PALMA".into(),
        }
        .is_tuple_fatal());
        assert!(!ScraperError::BrowserInit("x".into()).is_tuple_fatal());
        assert!(!ScraperError::Config("x".into()).is_tuple_fatal());
    }

    #[test]
    fn test_option_not_found_message() {
        let err = ScraperError::OptionNotFound {
            control: "Movimiento".into(),
            label: "SALIDA".into(),
        };
        assert!(err.to_string().contains("SALIDA"));
        assert!(err.to_string().contains("Movimiento"));
    }
}
