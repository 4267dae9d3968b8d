//! One run of a menu mode: discover the sources, build the report tables and
//! export them. Every fatal condition is raised before anything is written.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::aggregate::build_multi_period;
use crate::config::Config;
use crate::error::{ReportError, Result};
use crate::gpt::GptBuilder;
use crate::loader::{list_files, load_sources, LoadReport, PeriodTables, SourceSet};
use crate::output::{write_json, write_workbook};
use crate::reconcile::{reconcile, ReconStats, ReconcileInput};
use crate::table::Table;
use crate::types::{PeriodScope, RunMode, Workbook};

pub const DAILY_WORKBOOK: &str = "日-GPT报表";
pub const PERIOD_WORKBOOK: &str = "周月-GPT报表";
pub const SUMMARY_WORKBOOK: &str = "省区汇总报表";

/// Statistics file content for a provincial summary run.
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    pub load: LoadReport,
    pub reconciliation: ReconStats,
}

#[derive(Debug)]
pub struct RunSummary {
    pub mode: RunMode,
    pub workbook: Workbook,
    pub written: Vec<PathBuf>,
    pub stats: Option<RunStats>,
}

fn load_folder(dir: &Path, config: &Config) -> Result<(SourceSet, LoadReport)> {
    info!("reading sources from {}", dir.display());
    let files = list_files(dir)?;
    let (set, report) = load_sources(&files, &config.sources)?;
    info!(
        "{} files read, {} skipped",
        report.files_read, report.skipped_files
    );
    Ok((set, report))
}

/// The delay and route tables of one scope. A scope without files yields
/// empty tables carrying the configured header, so its report is empty
/// rather than an error.
fn period_tables(sources: &SourceSet, scope: PeriodScope, config: &Config) -> PeriodTables {
    let tables = sources.period(scope);
    let with_header = |table: &Table, header: Vec<String>| {
        if table.columns().is_empty() {
            warn!("no {scope:?} {} file found, the report will be empty", table.name());
            Table::new(table.name(), header)
        } else {
            table.clone()
        }
    };

    let gpt = &config.gpt;
    let mut delay_header = vec![gpt.date_column.clone(), gpt.route_column.clone()];
    delay_header.extend(config.catalog().quantity_columns());
    PeriodTables {
        delay: with_header(&tables.delay, delay_header),
        routes: with_header(&tables.routes, gpt.route_columns.clone()),
    }
}

pub fn daily_workbook(sources: &SourceSet, config: &Config) -> Result<Workbook> {
    let tables = period_tables(sources, PeriodScope::Single, config);
    let catalog = config.catalog();
    let report = GptBuilder::new(&config.gpt, &catalog).build(&tables.delay, &tables.routes)?;
    Ok(Workbook::new(DAILY_WORKBOOK).with_sheet(&config.output.single_sheet, report))
}

pub fn period_workbook(sources: &SourceSet, config: &Config) -> Result<Workbook> {
    let tables = period_tables(sources, PeriodScope::Multi, config);
    let catalog = config.catalog();
    let builder = GptBuilder::new(&config.gpt, &catalog);
    let report = build_multi_period(&builder, &tables.delay, &tables.routes)?;
    Ok(Workbook::new(PERIOD_WORKBOOK).with_sheet(&config.output.multi_sheet, report))
}

/// Both GPT reports plus the reconciled provincial summary.
pub fn summary_workbook(sources: &SourceSet, config: &Config) -> Result<(Workbook, ReconStats)> {
    let provincial = sources.provincial.as_ref().ok_or_else(|| ReportError::MissingSource {
        role: "provincial".to_string(),
    })?;
    let single_tables = period_tables(sources, PeriodScope::Single, config);
    let multi_tables = period_tables(sources, PeriodScope::Multi, config);

    let empty_reference;
    let full_route = match &sources.full_route {
        Some(table) => table,
        None => {
            warn!("no full-route file found, drift columns stay empty");
            let summary = &config.summary;
            empty_reference = Table::new(
                "full_route",
                vec![
                    summary.full_route_route_column.clone(),
                    summary.full_route_diff_column.clone(),
                ],
            );
            &empty_reference
        }
    };

    let catalog = config.catalog();
    let builder = GptBuilder::new(&config.gpt, &catalog);
    let single = builder.build(&single_tables.delay, &single_tables.routes)?;
    let multi = build_multi_period(&builder, &multi_tables.delay, &multi_tables.routes)?;

    let input = ReconcileInput {
        provincial,
        full_route,
        multi_period: &multi,
        single_period: &single,
    };
    let reconciled = reconcile(&config.summary, &catalog, &input)?;

    let output = &config.output;
    let workbook = Workbook::new(SUMMARY_WORKBOOK)
        .with_sheet(&output.summary_sheet, reconciled.summary)
        .with_sheet(&output.single_sheet, single)
        .with_sheet(&output.multi_sheet, multi);
    Ok((workbook, reconciled.stats))
}

/// Columns holding delay counts in any of the exported sheets.
fn quantity_columns(config: &Config) -> Vec<String> {
    let mut columns = config.catalog().quantity_columns();
    columns.push(config.summary.verified_quantity_column.clone());
    columns.push(config.summary.review_quantity_column.clone());
    columns
}

/// Run `mode` against the folders named in `config.paths`.
pub fn run_mode(mode: RunMode, config: &Config) -> Result<RunSummary> {
    let paths = &config.paths;
    let output_dir = paths.output_path.as_path();
    info!("{mode} started");

    let (workbook, stats) = match mode {
        RunMode::DailyGpt => {
            let (sources, _) = load_folder(&paths.day_datapath, config)?;
            (daily_workbook(&sources, config)?, None)
        }
        RunMode::PeriodGpt => {
            let (sources, _) = load_folder(&paths.week_datapath, config)?;
            (period_workbook(&sources, config)?, None)
        }
        RunMode::ProvincialSummary => {
            let (sources, load) = load_folder(&paths.report_datapath, config)?;
            let (workbook, reconciliation) = summary_workbook(&sources, config)?;
            (workbook, Some(RunStats { load, reconciliation }))
        }
        RunMode::Exit => {
            return Ok(RunSummary {
                mode,
                workbook: Workbook::new(""),
                written: Vec::new(),
                stats: None,
            })
        }
    };

    let workbook = workbook.with_numeric_columns(quantity_columns(config));
    let mut written = write_workbook(output_dir, &workbook, config.output.format)?;
    if let Some(stats) = &stats {
        let path = output_dir.join(&config.output.stats_file);
        write_json(&path, stats)?;
        info!("wrote {}", path.display());
        written.push(path);
    }
    info!("{mode} finished");
    Ok(RunSummary {
        mode,
        workbook,
        written,
        stats,
    })
}
