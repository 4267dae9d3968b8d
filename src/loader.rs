use std::fs;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::SourceConfig;
use crate::error::{ReportError, Result};
use crate::table::{Cell, Table};
use crate::types::PeriodScope;
use crate::util::{excel_serial_to_date, format_cell_number, format_count};

/// What a source file holds, decided from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceRole {
    Provincial,
    FullRoute,
    Delay,
    Route,
}

impl SourceRole {
    /// Tokens are checked in a fixed order so a file is read for one role
    /// only (`全线路` names also contain `线路`, provincial sheets may mention
    /// routes).
    pub fn of_file_name(name: &str, sources: &SourceConfig) -> Option<Self> {
        let checks = [
            (&sources.provincial_token, Self::Provincial),
            (&sources.full_route_token, Self::FullRoute),
            (&sources.delay_token, Self::Delay),
            (&sources.route_token, Self::Route),
        ];
        checks
            .into_iter()
            .find(|(token, _)| !token.is_empty() && name.contains(token.as_str()))
            .map(|(_, role)| role)
    }

    fn table_name(self) -> &'static str {
        match self {
            Self::Provincial => "provincial",
            Self::FullRoute => "full_route",
            Self::Delay => "delay",
            Self::Route => "routes",
        }
    }
}

/// Delay and route tables for one period scope.
#[derive(Debug, Clone, Default)]
pub struct PeriodTables {
    pub delay: Table,
    pub routes: Table,
}

#[derive(Debug, Clone, Default)]
pub struct SourceSet {
    pub single: PeriodTables,
    pub multi: PeriodTables,
    pub provincial: Option<Table>,
    pub full_route: Option<Table>,
}

impl SourceSet {
    pub fn period(&self, scope: PeriodScope) -> &PeriodTables {
        match scope {
            PeriodScope::Single => &self.single,
            PeriodScope::Multi => &self.multi,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub files_read: usize,
    pub skipped_files: usize,
    pub single_delay_rows: usize,
    pub single_route_rows: usize,
    pub multi_delay_rows: usize,
    pub multi_route_rows: usize,
    pub provincial_rows: usize,
    pub full_route_rows: usize,
}

/// Files of a folder in name order.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Read every recognised file and stack files of the same role.
pub fn load_sources(files: &[PathBuf], sources: &SourceConfig) -> Result<(SourceSet, LoadReport)> {
    let mut report = LoadReport::default();
    let mut single_delay = Vec::new();
    let mut single_routes = Vec::new();
    let mut multi_delay = Vec::new();
    let mut multi_routes = Vec::new();
    let mut provincial = Vec::new();
    let mut full_route = Vec::new();

    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Some(role) = SourceRole::of_file_name(&name, sources) else {
            report.skipped_files += 1;
            continue;
        };
        if !is_supported(path) {
            warn!("{}: unsupported file type, skipped", name);
            report.skipped_files += 1;
            continue;
        }

        let skip_rows = match role {
            SourceRole::Provincial => sources.provincial_skip_rows,
            SourceRole::FullRoute => sources.full_route_skip_rows,
            SourceRole::Delay | SourceRole::Route => 0,
        };
        let table = read_table(path, role.table_name(), skip_rows)?;
        info!("{}: {} rows", name, format_count(table.len()));
        report.files_read += 1;

        let scope = PeriodScope::of_file_name(&name, sources.single_name_max_chars);
        match (role, scope) {
            (SourceRole::Provincial, _) => provincial.push(table),
            (SourceRole::FullRoute, _) => full_route.push(table),
            (SourceRole::Delay, PeriodScope::Single) => single_delay.push(table),
            (SourceRole::Delay, PeriodScope::Multi) => multi_delay.push(table),
            (SourceRole::Route, PeriodScope::Single) => single_routes.push(table),
            (SourceRole::Route, PeriodScope::Multi) => multi_routes.push(table),
        }
    }

    let stacked = |name: &str, tables: &[Table]| -> Result<Option<Table>> {
        if tables.is_empty() {
            Ok(None)
        } else {
            Table::concat(name, tables).map(Some)
        }
    };
    let set = SourceSet {
        single: PeriodTables {
            delay: Table::concat("delay", &single_delay)?,
            routes: Table::concat("routes", &single_routes)?,
        },
        multi: PeriodTables {
            delay: Table::concat("delay", &multi_delay)?,
            routes: Table::concat("routes", &multi_routes)?,
        },
        provincial: stacked("provincial", &provincial)?,
        full_route: stacked("full_route", &full_route)?,
    };
    report.single_delay_rows = set.single.delay.len();
    report.single_route_rows = set.single.routes.len();
    report.multi_delay_rows = set.multi.delay.len();
    report.multi_route_rows = set.multi.routes.len();
    report.provincial_rows = set.provincial.as_ref().map_or(0, Table::len);
    report.full_route_rows = set.full_route.as_ref().map_or(0, Table::len);
    Ok((set, report))
}

fn extension(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

fn is_supported(path: &Path) -> bool {
    matches!(
        extension(path).as_str(),
        "csv" | "xlsx" | "xlsm" | "xls" | "xlsb" | "ods"
    )
}

/// Load one CSV or Excel file. `skip_rows` title rows above the header are
/// dropped; rows with no value at all are ignored.
pub fn read_table(path: &Path, name: &str, skip_rows: usize) -> Result<Table> {
    if extension(path) == "csv" {
        read_csv_table(path, name, skip_rows)
    } else {
        read_excel_table(path, name, skip_rows)
    }
}

fn clean_cell(s: &str) -> Cell {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn has_value(row: &[Cell]) -> bool {
    row.iter().any(Option::is_some)
}

fn read_csv_table(path: &Path, name: &str, skip_rows: usize) -> Result<Table> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut records = rdr.records().skip(skip_rows);

    let header = match records.next() {
        Some(record) => record?,
        None => return Ok(Table::new(name, Vec::new())),
    };
    let columns = header
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in records {
        let row: Vec<Cell> = record?.iter().map(clean_cell).collect();
        if has_value(&row) {
            rows.push(row);
        }
    }
    Ok(Table::from_rows(name, columns, rows))
}

fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => None,
        Data::String(s) => clean_cell(s),
        Data::Float(f) => Some(format_cell_number(*f)),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => {
            excel_serial_to_date(dt.as_f64()).map(|d| d.format("%Y-%m-%d").to_string())
        }
        Data::DateTimeIso(s) => clean_cell(s),
        Data::DurationIso(s) => clean_cell(s),
        Data::Error(_) => None,
    }
}

fn read_excel_table(path: &Path, name: &str, skip_rows: usize) -> Result<Table> {
    let excel_err = |e: String| ReportError::Excel(format!("{}: {e}", path.display()));

    let mut workbook = open_workbook_auto(path).map_err(|e| excel_err(e.to_string()))?;
    let first = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| excel_err("workbook has no sheets".to_string()))?;
    let range = workbook
        .worksheet_range(&first)
        .map_err(|e| excel_err(e.to_string()))?;

    let mut rows = range.rows().skip(skip_rows);
    let Some(header) = rows.next() else {
        return Ok(Table::new(name, Vec::new()));
    };
    let columns = header
        .iter()
        .map(|c| data_to_cell(c).unwrap_or_default())
        .collect();

    let data: Vec<Vec<Cell>> = rows
        .map(|row| row.iter().map(data_to_cell).collect::<Vec<_>>())
        .filter(|row| has_value(row))
        .collect();
    Ok(Table::from_rows(name, columns, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn role_tokens_are_exclusive() {
        let sources = SourceConfig::default();
        assert_eq!(SourceRole::of_file_name("省区城市线路汇总.xlsx", &sources), Some(SourceRole::Provincial));
        assert_eq!(SourceRole::of_file_name("全线路差值.csv", &sources), Some(SourceRole::FullRoute));
        assert_eq!(SourceRole::of_file_name("延误量0501.csv", &sources), Some(SourceRole::Delay));
        assert_eq!(SourceRole::of_file_name("城市线路0501.csv", &sources), Some(SourceRole::Route));
        assert_eq!(SourceRole::of_file_name("readme.txt", &sources), None);
    }

    #[test]
    fn csv_with_bom_title_row_and_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "省区.csv",
            "\u{feff}省区汇总,,\nGPT展示日期,城市线路名称,核心影响环节\n2024-05-01, A-B ,路由\n,,\n,C-D,\n",
        );
        let table = read_table(&path, "provincial", 1).unwrap();
        assert_eq!(table.columns(), &["GPT展示日期", "城市线路名称", "核心影响环节"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.value(0, "城市线路名称"), Some("A-B"));
        assert_eq!(table.value(1, "GPT展示日期"), None);
    }

    #[test]
    fn splits_delay_and_route_files_by_scope() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "延误量0501.csv", "日期,城市线路名称,路由延误量\n2024-05-01,A,1\n");
        write_file(
            dir.path(),
            "延误量0501-0507周报.csv",
            "日期,城市线路名称,路由延误量\n2024-05-01,A,1\n2024-05-02,A,2\n",
        );
        write_file(dir.path(), "城市线路0501.csv", "日期,城市线路名称\n2024-05-01,A\n");
        write_file(dir.path(), "notes.txt", "ignored");

        let files = list_files(dir.path()).unwrap();
        let (set, report) = load_sources(&files, &SourceConfig::default()).unwrap();
        assert_eq!(report.files_read, 3);
        assert_eq!(report.skipped_files, 1);
        assert_eq!(set.single.delay.len(), 1);
        assert_eq!(set.multi.delay.len(), 2);
        assert_eq!(set.single.routes.len(), 1);
        assert!(set.multi.routes.is_empty());
        assert!(set.provincial.is_none());
        assert_eq!(set.period(PeriodScope::Multi).delay.name(), "delay");
    }
}
