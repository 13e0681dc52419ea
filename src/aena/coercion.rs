//! 数値列の型変換

use tracing::warn;

use crate::error::ScraperError;

use super::types::{RawRecord, TypedRecord, MISSING, MONTHS};

/// レコードに付与するクエリ文脈
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordContext {
    pub movimiento: String,
    pub aeropuerto: String,
    pub year: Option<i32>,
}

/// 変換できなかった行
#[derive(Debug)]
pub struct RowError {
    pub airline: String,
    pub error: ScraperError,
}

/// 千の位区切り（`.`）を除いて整数化。センチネルは `None`
pub fn coerce_value(column: &str, raw: &str) -> Result<Option<i64>, ScraperError> {
    let trimmed = raw.trim();
    if trimmed == MISSING {
        return Ok(None);
    }
    trimmed
        .replace('.', "")
        .parse::<i64>()
        .map(Some)
        .map_err(|_| ScraperError::MalformedNumber {
            column: column.to_string(),
            value: raw.to_string(),
        })
}

pub fn coerce_record(raw: &RawRecord, ctx: &RecordContext) -> Result<TypedRecord, ScraperError> {
    let value = |column: &str| coerce_value(column, raw.get(column).unwrap_or(MISSING));

    let total = value("total")?;
    let mut months = [None; 12];
    for (slot, code) in months.iter_mut().zip(MONTHS) {
        *slot = value(code)?;
    }

    Ok(TypedRecord {
        airline: raw.airline().to_string(),
        movimiento: ctx.movimiento.clone(),
        aeropuerto: ctx.aeropuerto.clone(),
        year: ctx.year,
        total,
        months,
    })
}

/// 全レコードを変換する。不正な数値を含むレコードは捨てて `RowError` に記録する
pub fn coerce(
    records: impl IntoIterator<Item = RawRecord>,
    ctx: &RecordContext,
) -> (Vec<TypedRecord>, Vec<RowError>) {
    let mut typed = Vec::new();
    let mut errors = Vec::new();

    for record in records {
        match coerce_record(&record, ctx) {
            Ok(t) => typed.push(t),
            Err(error) => {
                warn!(
                    airline = record.airline(),
                    aeropuerto = %ctx.aeropuerto,
                    movimiento = %ctx.movimiento,
                    "Dropping record: {}",
                    error
                );
                errors.push(RowError {
                    airline: record.airline().to_string(),
                    error,
                });
            }
        }
    }

    (typed, errors)
}
