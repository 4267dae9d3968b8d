use std::fs;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook, XlsxError};
use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::Style;
use tracing::info;

use crate::config::ExportFormat;
use crate::error::Result;
use crate::table::Table;
use crate::types::Workbook;

pub fn write_csv(path: &Path, table: &Table) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(table.columns())?;
    for row in table.rows() {
        wtr.write_record(row.iter().map(|c| c.unwrap_or("")))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    fs::write(path, s)?;
    Ok(())
}

fn cell_position(row: usize, col: usize) -> Result<(u32, u16)> {
    let row = u32::try_from(row).map_err(|_| XlsxError::RowColumnLimitError)?;
    let col = u16::try_from(col).map_err(|_| XlsxError::RowColumnLimitError)?;
    Ok((row, col))
}

/// Value of a quantity cell when it holds a plain number. Formatted
/// percentages and zero-padded codes stay text.
fn numeric(value: &str) -> Option<f64> {
    let leading_zero = value.starts_with('0') && value.len() > 1 && !value.contains('.');
    if value.starts_with(' ') || leading_zero {
        return None;
    }
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn write_workbook_xlsx(path: &Path, workbook: &Workbook) -> Result<()> {
    let header = Format::new().set_bold();
    let mut xlsx = XlsxWorkbook::new();
    for sheet in &workbook.sheets {
        let worksheet = xlsx.add_worksheet().set_name(&sheet.name)?;
        let columns = sheet.table.columns();
        let is_quantity: Vec<bool> = columns
            .iter()
            .map(|c| workbook.numeric_columns.contains(c))
            .collect();
        for (c, name) in columns.iter().enumerate() {
            let (r, c) = cell_position(0, c)?;
            worksheet.write_string_with_format(r, c, name, &header)?;
        }
        for (i, row) in sheet.table.rows().iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                let Some(value) = *cell else {
                    continue;
                };
                let number = if is_quantity[c] { numeric(value) } else { None };
                let (r, c) = cell_position(i + 1, c)?;
                match number {
                    Some(n) => worksheet.write_number(r, c, n)?,
                    None => worksheet.write_string(r, c, value)?,
                };
            }
        }
    }
    xlsx.save(path)?;
    Ok(())
}

/// Write every sheet of `workbook` under `dir`; returns the files written.
pub fn write_workbook(dir: &Path, workbook: &Workbook, format: ExportFormat) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let written = match format {
        ExportFormat::Xlsx => {
            let path = dir.join(format!("{}.xlsx", workbook.name));
            write_workbook_xlsx(&path, workbook)?;
            vec![path]
        }
        ExportFormat::Csv => {
            let mut paths = Vec::with_capacity(workbook.sheets.len());
            for sheet in &workbook.sheets {
                let path = dir.join(format!("{}-{}.csv", workbook.name, sheet.name));
                write_csv(&path, &sheet.table)?;
                paths.push(path);
            }
            paths
        }
    };
    for path in &written {
        info!("wrote {}", path.display());
    }
    Ok(written)
}

/// First `max_rows` rows of `table` rendered as a Markdown table.
pub fn preview_table_rows(table: &Table, max_rows: usize) -> String {
    if table.is_empty() {
        return "(no rows)".to_string();
    }
    let mut builder = Builder::default();
    builder.push_record(table.columns().iter().cloned());
    for row in table.rows().iter().take(max_rows) {
        builder.push_record(row.iter().map(|c| c.unwrap_or_default().to_string()));
    }
    builder.build().with(Style::markdown()).to_string()
}

pub fn preview_workbook(workbook: &Workbook, max_rows: usize) {
    for sheet in &workbook.sheets {
        println!("\n{} ({} rows)\n", sheet.name, sheet.table.len());
        println!("{}\n", preview_table_rows(&sheet.table, max_rows));
    }
}
