//! 抽出結果のCSV出力

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::info;

use crate::aena::pipeline::RunReport;
use crate::aena::types::{LongRecord, WideTable, MONTHS};
use crate::error::ScraperError;

/// 出力ファイル
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFiles {
    pub wide: PathBuf,
    pub long: PathBuf,
}

fn wide_header(with_year: bool) -> Vec<&'static str> {
    let mut header = vec!["airline", "movimiento", "aeropuerto"];
    if with_year {
        header.push("year");
    }
    header.push("total");
    header.extend(MONTHS);
    header
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// ワイド形式を書き出す。`year` 列は過去年のレコードがある場合のみ
pub fn write_wide<W: Write>(writer: W, table: &WideTable) -> Result<(), ScraperError> {
    let with_year = table.has_year();
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(wide_header(with_year))?;

    for record in &table.records {
        let mut row = vec![
            record.airline.clone(),
            record.movimiento.clone(),
            record.aeropuerto.clone(),
        ];
        if with_year {
            row.push(opt(record.year));
        }
        row.push(opt(record.total));
        row.extend(record.months.iter().map(|m| opt(*m)));
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn write_long<W: Write>(writer: W, records: &[LongRecord]) -> Result<(), ScraperError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records {
        wtr.serialize(record)?;
    }
    if records.is_empty() {
        wtr.write_record(["airline", "movimiento", "aeropuerto", "fecha", "num_pasajeros"])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_wide_csv(path: impl AsRef<Path>, table: &WideTable) -> Result<(), ScraperError> {
    let file = std::fs::File::create(path.as_ref())?;
    write_wide(file, table)
}

pub fn write_long_csv(path: impl AsRef<Path>, records: &[LongRecord]) -> Result<(), ScraperError> {
    let file = std::fs::File::create(path.as_ref())?;
    write_long(file, records)
}

/// `dir` にタイムスタンプ付きでワイド・ロングの両方を書き出す
pub fn export_run(dir: impl AsRef<Path>, report: &RunReport) -> Result<ExportedFiles, ScraperError> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let stem = format!("pasajeros_{}", Local::now().format("%Y%m%d_%H%M%S"));
    let files = ExportedFiles {
        wide: dir.join(format!("{}_wide.csv", stem)),
        long: dir.join(format!("{}_long.csv", stem)),
    };

    write_wide_csv(&files.wide, &report.wide)?;
    let long = report.long_table();
    write_long_csv(&files.long, &long)?;

    info!(
        "CSV exported: wide={:?} ({} rows), long={:?} ({} rows)",
        files.wide,
        report.wide.len(),
        files.long,
        long.len()
    );
    Ok(files)
}
