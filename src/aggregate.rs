//! Weekly/monthly GPT report: one single-period build per date present in both
//! inputs, stacked and sorted by (date, route).

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::error::Result;
use crate::gpt::GptBuilder;
use crate::table::Table;
use crate::util::format_count;

pub fn build_multi_period(builder: &GptBuilder<'_>, delay: &Table, routes: &Table) -> Result<Table> {
    let config = builder.config();
    let date = config.date_column.as_str();
    let (delay, routes) = builder.prepare(delay, routes)?;

    let delay_dates = delay.distinct(date)?;
    let route_dates = routes.distinct(date)?;
    let dates: BTreeSet<&String> = delay_dates.intersection(&route_dates).collect();
    let dropped = delay_dates.symmetric_difference(&route_dates).count();
    if dropped > 0 {
        debug!("{} dates present in only one source were dropped", dropped);
    }

    let mut per_date = Vec::with_capacity(dates.len());
    for d in &dates {
        let delay_day = delay.filter_eq(date, d)?;
        let routes_day = routes.filter_eq(date, d)?;
        per_date.push(builder.build_prepared(&delay_day, &routes_day)?);
    }

    // No common date: still hand back the report header.
    let report = if per_date.is_empty() {
        let empty = routes.filter_eq(date, "")?;
        builder.build_prepared(&delay, &empty)?
    } else {
        Table::concat("gpt", &per_date)?
    };

    let sorted = report.sorted_by(&[config.output_date_column(), config.output_route_column()])?;
    info!(
        "multi-period GPT report built: {} dates, {} rows",
        dates.len(),
        format_count(sorted.len())
    );
    Ok(sorted)
}
