// Run configuration
// Loaded from config/config.json; every section falls back to its defaults.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};
use crate::stages::{StageCatalog, StageSpec, TieBreak, DEFAULT_STAGES};

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn rename_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect()
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathConfig,
    pub log: LogConfig,
    pub sources: SourceConfig,
    pub stages: Vec<StageSpec>,
    pub tie_break: TieBreak,
    pub gpt: GptConfig,
    pub summary: SummaryConfig,
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathConfig::default(),
            log: LogConfig::default(),
            sources: SourceConfig::default(),
            stages: DEFAULT_STAGES.clone(),
            tie_break: TieBreak::default(),
            gpt: GptConfig::default(),
            summary: SummaryConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    pub fn from_json(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.stages.is_empty() {
            return Err(ReportError::Config("stage catalog is empty".into()));
        }
        let mut seen = HashSet::new();
        for spec in &self.stages {
            if !seen.insert(spec.stage) {
                return Err(ReportError::Config(format!("stage '{}' listed twice", spec.stage)));
            }
            if spec.token.is_empty() {
                return Err(ReportError::Config(format!("stage '{}' has an empty token", spec.stage)));
            }
        }
        if self.summary.required_columns.is_empty() {
            return Err(ReportError::Config("summary.required_columns is empty".into()));
        }
        if self.summary.full_route_scale == 0.0 {
            return Err(ReportError::Config("summary.full_route_scale must not be zero".into()));
        }
        if !self.gpt.route_columns.contains(&self.gpt.label_column) {
            return Err(ReportError::Config(format!(
                "gpt.route_columns must include the label column '{}'",
                self.gpt.label_column
            )));
        }
        Ok(())
    }

    pub fn catalog(&self) -> StageCatalog {
        StageCatalog::new(self.stages.clone(), self.tie_break)
    }
}

// ---------------------------------------------------------------------------
// Paths and logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Folder with single-day exports (mode 1).
    pub day_datapath: PathBuf,
    /// Folder with weekly/monthly exports (mode 2).
    pub week_datapath: PathBuf,
    /// Folder with everything the provincial summary needs (mode 3).
    pub report_datapath: PathBuf,
    pub output_path: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            day_datapath: PathBuf::from("data/day"),
            week_datapath: PathBuf::from("data/week"),
            report_datapath: PathBuf::from("data/report"),
            output_path: PathBuf::from("output"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive; `RUST_LOG` wins when set.
    pub level: String,
    /// Append log lines to this file as well as the console.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Source discovery
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub delay_token: String,
    pub route_token: String,
    pub provincial_token: String,
    pub full_route_token: String,
    /// Delay/route files whose name is shorter than this many characters are
    /// single-day exports; longer names are weekly/monthly.
    pub single_name_max_chars: usize,
    /// Title rows above the header in the provincial workbook.
    pub provincial_skip_rows: usize,
    pub full_route_skip_rows: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            delay_token: "延误量".to_string(),
            route_token: "城市线路".to_string(),
            provincial_token: "省区".to_string(),
            full_route_token: "全线路".to_string(),
            single_name_max_chars: 15,
            provincial_skip_rows: 1,
            full_route_skip_rows: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// GPT report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GptConfig {
    pub date_column: String,
    pub route_column: String,
    /// Route-attribute columns carried into the report, in output order.
    pub route_columns: Vec<String>,
    pub renames: BTreeMap<String, String>,
    pub label_column: String,
    pub label_position: usize,
    /// Columns already in percentage points, reformatted as `" 95.50%"`.
    pub points_columns: Vec<String>,
}

impl Default for GptConfig {
    fn default() -> Self {
        Self {
            date_column: "日期".to_string(),
            route_column: "城市线路名称".to_string(),
            route_columns: strings(&[
                "日期",
                "城市线路名称",
                "标准",
                "达成率(%)",
                "与第一差值(%)",
                "线路未达成量",
                "延误量最大3环节",
            ]),
            renames: rename_map(&[("城市线路名称", "城市线路"), ("标准", "标准时效")]),
            label_column: "延误量最大3环节".to_string(),
            label_position: 4,
            points_columns: strings(&["达成率(%)", "与第一差值(%)"]),
        }
    }
}

impl GptConfig {
    /// Name of a route-table column after the report renames.
    pub fn output_name(&self, column: &str) -> String {
        self.renames.get(column).cloned().unwrap_or_else(|| column.to_string())
    }

    /// Date column name as it appears in a built report.
    pub fn output_date_column(&self) -> String {
        self.output_name(&self.date_column)
    }

    /// Route column name as it appears in a built report.
    pub fn output_route_column(&self) -> String {
        self.output_name(&self.route_column)
    }

    pub fn output_label_column(&self) -> String {
        self.output_name(&self.label_column)
    }
}

// ---------------------------------------------------------------------------
// Provincial summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub date_column: String,
    pub route_column: String,
    pub label_column: String,
    pub diff_column: String,

    /// Multi-period report columns carried into the summary, and their names.
    pub multi_period_renames: BTreeMap<String, String>,
    pub verified_quantity_column: String,
    pub verified_share_column: String,

    /// Single-period report columns carried into the summary, and their names.
    pub single_period_renames: BTreeMap<String, String>,
    pub review_date_column: String,
    pub review_label_column: String,
    pub review_quantity_column: String,
    pub review_share_column: String,
    pub resolved_sentinel: String,

    pub full_route_route_column: String,
    pub full_route_diff_column: String,
    pub full_route_scale: f64,
    pub full_route_output_column: String,
    pub diff_change_column: String,

    /// Output columns, in order. Any name missing after reconciliation is a
    /// schema integrity error.
    pub required_columns: Vec<String>,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            date_column: "GPT展示日期".to_string(),
            route_column: "城市线路名称".to_string(),
            label_column: "核心影响环节".to_string(),
            diff_column: "与第一差值".to_string(),
            multi_period_renames: rename_map(&[
                ("日期", "GPT展示日期"),
                ("城市线路", "城市线路名称"),
                ("与第一差值(%)", "新-与第一差值"),
                ("线路未达成量", "新-未达成量"),
            ]),
            verified_quantity_column: "新-延误量".to_string(),
            verified_share_column: "新-延误占比".to_string(),
            single_period_renames: rename_map(&[
                ("日期", "复盘-日期"),
                ("城市线路", "城市线路名称"),
                ("与第一差值(%)", "复盘-与第一差值"),
                ("线路未达成量", "复盘-未达成量"),
                ("延误量最大3环节", "复盘-核心影响环节"),
            ]),
            review_date_column: "复盘-日期".to_string(),
            review_label_column: "复盘-核心影响环节".to_string(),
            review_quantity_column: "复盘-延误量".to_string(),
            review_share_column: "复盘-延误占比".to_string(),
            resolved_sentinel: "消除".to_string(),
            full_route_route_column: "城市线路名称".to_string(),
            full_route_diff_column: "与第一差值".to_string(),
            full_route_scale: 10_000.0,
            full_route_output_column: "全线路-与第一差值".to_string(),
            diff_change_column: "差值变化".to_string(),
            required_columns: strings(&[
                "GPT展示日期",
                "城市线路名称",
                "核心影响环节",
                "与第一差值",
                "未达成量",
                "新-与第一差值",
                "新-未达成量",
                "新-延误量",
                "新-延误占比",
                "复盘-核心影响环节",
                "复盘-与第一差值",
                "复盘-未达成量",
                "复盘-延误量",
                "复盘-延误占比",
                "全线路-与第一差值",
                "差值变化",
            ]),
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Xlsx,
    Csv,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: ExportFormat,
    /// Rows of each sheet echoed to the console after a run.
    pub preview_rows: usize,
    pub stats_file: String,
    pub summary_sheet: String,
    pub single_sheet: String,
    pub multi_sheet: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: ExportFormat::Xlsx,
            preview_rows: 3,
            stats_file: "summary_stats.json".to_string(),
            summary_sheet: "省区汇总".to_string(),
            single_sheet: "单日GPT".to_string(),
            multi_sheet: "周月GPT".to_string(),
        }
    }
}
