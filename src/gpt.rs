//! Single-period GPT report: route attributes joined with the per-stage delay
//! breakdown, plus each stage's share of the route's total delay.

use tracing::{debug, info};

use crate::config::GptConfig;
use crate::error::Result;
use crate::metrics::{format_percent, reformat_points_cell};
use crate::stages::StageCatalog;
use crate::table::{Cell, Joined, Table};
use crate::util::{format_count, normalize_date, parse_number_cell};

pub struct GptBuilder<'a> {
    config: &'a GptConfig,
    catalog: &'a StageCatalog,
}

impl<'a> GptBuilder<'a> {
    pub fn new(config: &'a GptConfig, catalog: &'a StageCatalog) -> Self {
        Self { config, catalog }
    }

    pub fn config(&self) -> &GptConfig {
        self.config
    }

    /// Project both inputs to the columns the report uses and normalize their
    /// date columns to ISO dates.
    pub fn prepare(&self, delay: &Table, routes: &Table) -> Result<(Table, Table)> {
        let date = self.config.date_column.as_str();
        let mut delay_columns = vec![date.to_string(), self.config.route_column.clone()];
        delay_columns.extend(self.catalog.quantity_columns());

        let delay = delay.select(&delay_columns)?.map_column(date, normalize_date)?;
        let routes = routes
            .select(&self.config.route_columns)?
            .map_column(date, normalize_date)?;
        Ok((delay, routes))
    }

    /// Build the report for one date scope.
    pub fn build(&self, delay: &Table, routes: &Table) -> Result<Table> {
        let (delay, routes) = self.prepare(delay, routes)?;
        let report = self.build_prepared(&delay, &routes)?;
        info!("GPT report built: {} rows", format_count(report.len()));
        Ok(report)
    }

    /// Build from inputs that already went through [`GptBuilder::prepare`].
    pub(crate) fn build_prepared(&self, delay: &Table, routes: &Table) -> Result<Table> {
        let keys = [self.config.date_column.as_str(), self.config.route_column.as_str()];
        let Joined { table: joined, matches } = routes.left_join(delay, &keys, &keys)?;

        let specs = self.catalog.specs();
        let quantity_cols = specs
            .iter()
            .map(|s| joined.column_values(&s.quantity_column))
            .collect::<Result<Vec<_>>>()?;

        let mut quantities: Vec<Vec<Cell>> = vec![Vec::with_capacity(joined.len()); specs.len()];
        let mut shares: Vec<Vec<Cell>> = vec![Vec::with_capacity(joined.len()); specs.len()];
        let mut unmatched = 0usize;
        for (row, matched) in matches.iter().map(Option::is_some).enumerate() {
            if !matched {
                unmatched += 1;
            }
            let values: Vec<f64> = quantity_cols
                .iter()
                .map(|col| parse_number_cell(col[row]).unwrap_or(0.0))
                .collect();
            let sum: f64 = values.iter().sum();
            for (i, value) in values.iter().enumerate() {
                quantities[i].push(quantity_cols[i][row].map(str::to_string));
                let share = match (matched, sum > 0.0) {
                    (false, _) => None,
                    (true, true) => Some(format_percent(value / sum)),
                    (true, false) => Some(format_percent(0.0)),
                };
                shares[i].push(share);
            }
        }
        if unmatched > 0 {
            debug!("{} route rows without a delay breakdown", format_count(unmatched));
        }

        let label = self.config.output_label_column();
        let mut report = joined
            .select(&self.config.route_columns)?
            .renamed(&self.config.renames)?
            .move_column(&label, self.config.label_position)?;
        for column in &self.config.points_columns {
            report = report.map_column(&self.config.output_name(column), reformat_points_cell)?;
        }
        for ((spec, q), s) in specs.iter().zip(quantities).zip(shares) {
            report = report
                .with_column(&spec.quantity_column, q)?
                .with_column(&spec.share_column, s)?;
        }
        Ok(report.with_name("gpt"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::ReportError;
    use crate::metrics::parse_percent;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn cells(values: &[&str]) -> Vec<Cell> {
        values
            .iter()
            .map(|v| if v.is_empty() { None } else { Some(v.to_string()) })
            .collect()
    }

    fn delay_table(rows: &[[&str; 8]]) -> Table {
        Table::from_rows(
            "delay",
            cols(&[
                "日期",
                "城市线路名称",
                "路由延误量",
                "干线运输延误量",
                "网点交件延误量",
                "网点发件延误量",
                "中心进港延误量",
                "中心出港延误量",
            ]),
            rows.iter().map(|r| cells(r)).collect(),
        )
    }

    fn route_table(rows: &[[&str; 7]]) -> Table {
        Table::from_rows(
            "routes",
            cols(&[
                "日期",
                "城市线路名称",
                "标准",
                "达成率(%)",
                "与第一差值(%)",
                "线路未达成量",
                "延误量最大3环节",
            ]),
            rows.iter().map(|r| cells(r)).collect(),
        )
    }

    fn build(delay: &Table, routes: &Table) -> Table {
        let config = Config::default();
        let catalog = config.catalog();
        GptBuilder::new(&config.gpt, &catalog).build(delay, routes).unwrap()
    }

    #[test]
    fn single_stage_takes_full_share() {
        let delay = delay_table(&[["2024-05-01", "A-B", "10", "0", "0", "0", "0", "0"]]);
        let routes = route_table(&[["2024/5/1", "A-B", "48", "95.5", "-1.2", "3", "路由"]]);
        let report = build(&delay, &routes);
        assert_eq!(report.len(), 1);
        assert_eq!(report.value(0, "路由占比").map(str::trim), Some("100.00%"));
        for share in ["干线运输占比", "网点交件占比", "网点发件占比", "中心进港占比", "中心出港占比"] {
            assert_eq!(report.value(0, share).map(str::trim), Some("0.00%"), "{share}");
        }
        assert_eq!(report.value(0, "路由延误量"), Some("10"));
        assert_eq!(report.value(0, "日期"), Some("2024-05-01"));
        assert_eq!(report.value(0, "达成率(%)"), Some(" 95.50%"));
        assert_eq!(report.value(0, "与第一差值(%)"), Some("-1.20%"));
    }

    #[test]
    fn column_order_puts_label_at_four_and_interleaves_stages() {
        let report = build(&delay_table(&[]), &route_table(&[]));
        assert!(report.is_empty());
        assert_eq!(
            report.columns(),
            &cols(&[
                "日期",
                "城市线路",
                "标准时效",
                "达成率(%)",
                "延误量最大3环节",
                "与第一差值(%)",
                "线路未达成量",
                "路由延误量",
                "路由占比",
                "干线运输延误量",
                "干线运输占比",
                "网点交件延误量",
                "网点交件占比",
                "网点发件延误量",
                "网点发件占比",
                "中心进港延误量",
                "中心进港占比",
                "中心出港延误量",
                "中心出港占比",
            ])[..]
        );
    }

    #[test]
    fn zero_total_reports_zero_shares() {
        let delay = delay_table(&[["2024-05-01", "A-B", "0", "0", "0", "0", "0", "0"]]);
        let routes = route_table(&[["2024-05-01", "A-B", "48", "100", "0", "0", ""]]);
        let report = build(&delay, &routes);
        let config = Config::default();
        for spec in &config.stages {
            assert_eq!(report.value(0, &spec.share_column), Some(" 0.00%"));
        }
    }

    #[test]
    fn shares_sum_to_one_for_positive_totals() {
        let delay = delay_table(&[
            ["2024-05-01", "A-B", "3", "7", "11", "0", "5", "1"],
            ["2024-05-01", "C-D", "1", "1", "1", "0", "0", "0"],
        ]);
        let routes = route_table(&[
            ["2024-05-01", "A-B", "48", "90", "2", "5", "交件"],
            ["2024-05-01", "C-D", "72", "80", "4", "9", "路由"],
        ]);
        let report = build(&delay, &routes);
        let config = Config::default();
        for row in 0..report.len() {
            let total: f64 = config
                .stages
                .iter()
                .map(|s| parse_percent(report.value(row, &s.share_column).unwrap()))
                .sum();
            assert!((total - 1.0).abs() <= 6.0 * 0.000_05 + 1e-9, "row {row}: {total}");
        }
    }

    #[test]
    fn route_without_delay_row_keeps_empty_stage_cells() {
        let delay = delay_table(&[["2024-05-01", "X-Y", "1", "0", "0", "0", "0", "0"]]);
        let routes = route_table(&[["2024-05-01", "A-B", "48", "90", "2", "5", "交件"]]);
        let report = build(&delay, &routes);
        assert_eq!(report.len(), 1);
        assert_eq!(report.value(0, "城市线路"), Some("A-B"));
        assert_eq!(report.value(0, "路由延误量"), None);
        assert_eq!(report.value(0, "路由占比"), None);
    }

    #[test]
    fn duplicate_delay_rows_do_not_multiply_routes() {
        let delay = delay_table(&[
            ["2024-05-01", "A-B", "4", "0", "0", "0", "0", "0"],
            ["2024-05-01", "A-B", "0", "9", "0", "0", "0", "0"],
        ]);
        let routes = route_table(&[["2024-05-01", "A-B", "48", "90", "2", "5", "路由"]]);
        let report = build(&delay, &routes);
        assert_eq!(report.len(), 1);
        assert_eq!(report.value(0, "路由延误量"), Some("4"));
    }

    #[test]
    fn matched_row_with_blank_quantities_gets_zero_shares() {
        let delay = delay_table(&[["2024-05-01", "A-B", "", "", "", "", "", ""]]);
        let routes = route_table(&[["2024-05-01", "A-B", "48", "90", "2", "5", "路由"]]);
        let report = build(&delay, &routes);
        let config = Config::default();
        for spec in &config.stages {
            assert_eq!(report.value(0, &spec.quantity_column), None);
            assert_eq!(report.value(0, &spec.share_column), Some(" 0.00%"));
        }
    }

    #[test]
    fn missing_stage_column_is_reported() {
        let delay = Table::from_rows("delay", cols(&["日期", "城市线路名称"]), vec![]);
        let config = Config::default();
        let catalog = config.catalog();
        let err = GptBuilder::new(&config.gpt, &catalog)
            .build(&delay, &route_table(&[]))
            .unwrap_err();
        assert!(
            matches!(err, ReportError::MissingColumn { ref table, ref column } if table == "delay" && column == "路由延误量")
        );
    }
}
