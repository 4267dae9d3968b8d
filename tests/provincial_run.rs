use std::fs;
use std::path::Path;

use provincial_summary::config::ExportFormat;
use provincial_summary::process::run_mode;
use provincial_summary::{Config, ReportError, RunMode};

const DELAY_HEADER: &str =
    "日期,城市线路名称,路由延误量,干线运输延误量,网点交件延误量,网点发件延误量,中心进港延误量,中心出港延误量";
const ROUTE_HEADER: &str = "日期,城市线路名称,标准,达成率(%),与第一差值(%),线路未达成量,延误量最大3环节";

fn write(dir: &Path, name: &str, lines: &[&str]) {
    fs::write(dir.join(name), lines.join("\n") + "\n").unwrap();
}

fn write_period_sources(dir: &Path) {
    write_single_day_sources(dir);
    write_weekly_sources(dir);
}

fn write_single_day_sources(dir: &Path) {
    write(
        dir,
        "延误量0502.csv",
        &[DELAY_HEADER, "2024-05-02,A-B,4,0,4,0,0,0"],
    );
    write(
        dir,
        "城市线路0502.csv",
        &[ROUTE_HEADER, "2024/5/2,A-B,48,96.1,-0.8,2,交件"],
    );
}

fn write_weekly_sources(dir: &Path) {
    write(
        dir,
        "延误量0501-0507周报.csv",
        &[
            DELAY_HEADER,
            "2024-05-01,A-B,10,0,0,0,0,0",
            "2024-05-01,C-D,1,3,0,0,0,0",
        ],
    );
    write(
        dir,
        "城市线路0501-0507周报.csv",
        &[
            ROUTE_HEADER,
            "2024-05-01,A-B,48,95.5,-1.5,3,路由",
            "2024-05-01,C-D,72,90,2,4,干线",
        ],
    );
}

fn write_provincial(dir: &Path) {
    write(
        dir,
        "省区汇总.csv",
        &[
            "省区汇总报表,,,,",
            "GPT展示日期,城市线路名称,核心影响环节,与第一差值,未达成量",
            "2024-05-01,A-B,路由,-1.50%,3",
            ",C-D,干线,2.00%,4",
        ],
    );
}

fn config_for(root: &Path) -> Config {
    let mut config = Config::default();
    let data = root.join("data");
    config.paths.day_datapath = data.clone();
    config.paths.week_datapath = data.clone();
    config.paths.report_datapath = data;
    config.paths.output_path = root.join("output");
    config.output.format = ExportFormat::Csv;
    config
}

fn read_rows(path: &Path) -> Vec<Vec<String>> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(false).from_path(path).unwrap();
    rdr.records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

fn column<'a>(rows: &'a [Vec<String>], name: &str) -> Vec<&'a str> {
    let idx = rows[0].iter().position(|c| c == name).unwrap();
    rows[1..].iter().map(|r| r[idx].as_str()).collect()
}

#[test]
fn provincial_summary_end_to_end() {
    let root = tempfile::tempdir().unwrap();
    let data = root.path().join("data");
    fs::create_dir_all(&data).unwrap();
    write_period_sources(&data);
    write_provincial(&data);
    write(&data, "全线路差值.csv", &["城市线路名称,与第一差值", "A-B,500"]);

    let config = config_for(root.path());
    let summary = run_mode(RunMode::ProvincialSummary, &config).unwrap();

    let output = root.path().join("output");
    assert_eq!(summary.written.len(), 4);
    assert!(output.join("summary_stats.json").exists());

    let rows = read_rows(&output.join("省区汇总报表-省区汇总.csv"));
    assert_eq!(rows[0], config.summary.required_columns);
    assert_eq!(rows.len(), 3);

    assert_eq!(column(&rows, "GPT展示日期"), vec!["2024-05-01", "2024-05-01"]);
    assert_eq!(column(&rows, "新-延误量"), vec!["10", "3"]);
    assert_eq!(column(&rows, "新-延误占比"), vec![" 100.00%", " 75.00%"]);
    assert_eq!(column(&rows, "复盘-核心影响环节"), vec!["交件", "消除"]);
    assert_eq!(column(&rows, "复盘-延误量"), vec!["4", ""]);
    assert_eq!(column(&rows, "复盘-延误占比"), vec![" 50.00%", ""]);
    assert_eq!(column(&rows, "全线路-与第一差值"), vec![" 5.00%", ""]);
    assert_eq!(column(&rows, "差值变化"), vec![" 6.50%", ""]);

    let stats = summary.stats.unwrap().reconciliation;
    assert_eq!(stats.provincial_rows, 2);
    assert_eq!(stats.verified_filled, 2);
    assert_eq!(stats.review_filled, 1);
    assert_eq!(stats.review_resolved, 1);
    assert_eq!(stats.full_route_matched, 1);

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(output.join("summary_stats.json")).unwrap()).unwrap();
    assert_eq!(json["reconciliation"]["review_resolved"], 1);
    assert_eq!(json["load"]["files_read"], 6);
}

#[test]
fn missing_full_route_leaves_drift_empty() {
    let root = tempfile::tempdir().unwrap();
    let data = root.path().join("data");
    fs::create_dir_all(&data).unwrap();
    write_period_sources(&data);
    write_provincial(&data);

    let config = config_for(root.path());
    let summary = run_mode(RunMode::ProvincialSummary, &config).unwrap();
    let table = summary.workbook.sheet("省区汇总").unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.value(0, "全线路-与第一差值"), None);
    assert_eq!(table.value(0, "差值变化"), None);
    assert_eq!(summary.stats.unwrap().reconciliation.full_route_matched, 0);
}

#[test]
fn missing_provincial_file_fails_before_writing() {
    let root = tempfile::tempdir().unwrap();
    let data = root.path().join("data");
    fs::create_dir_all(&data).unwrap();
    write_period_sources(&data);

    let config = config_for(root.path());
    let err = run_mode(RunMode::ProvincialSummary, &config).unwrap_err();
    assert!(matches!(err, ReportError::MissingSource { ref role } if role == "provincial"));
    assert!(!root.path().join("output").exists());
}

#[test]
fn daily_mode_writes_xlsx_workbook() {
    let root = tempfile::tempdir().unwrap();
    let data = root.path().join("data");
    fs::create_dir_all(&data).unwrap();
    write_period_sources(&data);

    let mut config = config_for(root.path());
    config.output.format = ExportFormat::Xlsx;
    let summary = run_mode(RunMode::DailyGpt, &config).unwrap();

    let report = summary.workbook.sheet("单日GPT").unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report.value(0, "网点交件占比"), Some(" 50.00%"));
    assert_eq!(summary.written, vec![root.path().join("output").join("日-GPT报表.xlsx")]);
    assert!(summary.written[0].exists());
    assert!(summary.stats.is_none());
}

#[test]
fn period_mode_uses_weekly_files_only() {
    let root = tempfile::tempdir().unwrap();
    let data = root.path().join("data");
    fs::create_dir_all(&data).unwrap();
    write_period_sources(&data);

    let config = config_for(root.path());
    let summary = run_mode(RunMode::PeriodGpt, &config).unwrap();
    let report = summary.workbook.sheet("周月GPT").unwrap();
    assert_eq!(report.len(), 2);
    assert_eq!(report.value(1, "城市线路"), Some("C-D"));
    assert_eq!(report.value(1, "干线运输占比"), Some(" 75.00%"));
    assert!(root.path().join("output").join("周月-GPT报表-周月GPT.csv").exists());
}

#[test]
fn period_mode_without_weekly_files_writes_empty_report() {
    let root = tempfile::tempdir().unwrap();
    let data = root.path().join("data");
    fs::create_dir_all(&data).unwrap();
    write_single_day_sources(&data);

    let config = config_for(root.path());
    let summary = run_mode(RunMode::PeriodGpt, &config).unwrap();
    let report = summary.workbook.sheet("周月GPT").unwrap();
    assert!(report.is_empty());
    assert_eq!(report.columns().len(), 19);

    let rows = read_rows(&root.path().join("output").join("周月-GPT报表-周月GPT.csv"));
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][1], "城市线路");
    assert_eq!(rows[0][18], "中心出港占比");
}

#[test]
fn summary_without_single_day_files_resolves_every_row() {
    let root = tempfile::tempdir().unwrap();
    let data = root.path().join("data");
    fs::create_dir_all(&data).unwrap();
    write_weekly_sources(&data);
    write_provincial(&data);

    let config = config_for(root.path());
    let summary = run_mode(RunMode::ProvincialSummary, &config).unwrap();
    assert!(summary.workbook.sheet("单日GPT").unwrap().is_empty());

    let rows = read_rows(&root.path().join("output").join("省区汇总报表-省区汇总.csv"));
    assert_eq!(column(&rows, "复盘-核心影响环节"), vec!["消除", "消除"]);
    assert_eq!(column(&rows, "复盘-延误量"), vec!["", ""]);
    // Verified figures still come from the weekly report.
    assert_eq!(column(&rows, "新-延误量"), vec!["10", "3"]);

    let stats = summary.stats.unwrap().reconciliation;
    assert_eq!(stats.review_resolved, 2);
    assert_eq!(stats.review_matched, 0);
}
