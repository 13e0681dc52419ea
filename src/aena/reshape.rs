//! ワイド形式（月が列）からロング形式（航空会社×月が行）への変換

use super::types::{LongRecord, TypedRecord, WideTable, MONTHS};

/// 月コード → 月番号（1始まり）
pub fn month_number(code: &str) -> Option<u32> {
    MONTHS
        .iter()
        .position(|m| *m == code)
        .map(|idx| idx as u32 + 1)
}

/// 1レコードをロング形式へ。欠損月は出力しない。`total` は月ではないので除外
pub fn record_to_long(record: &TypedRecord, year: i32) -> impl Iterator<Item = LongRecord> + '_ {
    MONTHS
        .iter()
        .zip(record.months.iter())
        .filter_map(move |(code, value)| {
            let month = month_number(code)?;
            value.map(|num_pasajeros| LongRecord {
                airline: record.airline.clone(),
                movimiento: record.movimiento.clone(),
                aeropuerto: record.aeropuerto.clone(),
                fecha: format!("{}-{:02}", year, month),
                num_pasajeros,
            })
        })
}

pub fn to_long(wide: &WideTable) -> Vec<LongRecord> {
    wide.records
        .iter()
        .flat_map(|record| record_to_long(record, record.year.unwrap_or(wide.reference_year)))
        .collect()
}
