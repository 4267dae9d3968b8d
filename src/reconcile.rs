//! Provincial summary reconciliation.
//!
//! The provincial baseline is cross-checked against the multi-period GPT
//! report ("verified" figures), the single-period GPT report ("review"
//! figures) and the full-route reference (drift). Each step derives new
//! columns from keyed lookups; the only fatal check is the final schema
//! validation against the configured output columns.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::SummaryConfig;
use crate::error::{ReportError, Result};
use crate::metrics::{format_percent, parse_percent_cell, rescale};
use crate::stages::{Stage, StageCatalog, StageMatch};
use crate::table::{Cell, Joined, Table};
use crate::util::{format_count, normalize_date, parse_number_cell};

/// The four tables the summary is built from.
pub struct ReconcileInput<'a> {
    pub provincial: &'a Table,
    pub full_route: &'a Table,
    pub multi_period: &'a Table,
    pub single_period: &'a Table,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmbiguousLabel {
    pub origin: String,
    pub label: String,
    pub candidates: Vec<Stage>,
    pub selected: Stage,
}

/// Counters written next to the summary so gaps in the report can be traced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconStats {
    pub provincial_rows: usize,
    pub verified_matched: usize,
    pub verified_filled: usize,
    pub review_matched: usize,
    pub review_resolved: usize,
    pub review_filled: usize,
    pub full_route_matched: usize,
    pub unclassified_labels: usize,
    pub ambiguous_labels: Vec<AmbiguousLabel>,
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub summary: Table,
    pub stats: ReconStats,
}

pub fn reconcile(
    config: &SummaryConfig,
    catalog: &StageCatalog,
    input: &ReconcileInput<'_>,
) -> Result<Reconciliation> {
    let mut stats = ReconStats::default();
    let date = config.date_column.as_str();
    let route = config.route_column.as_str();
    let keys = [date, route];

    // Gaps come from merged cells in the provincial workbook.
    let provincial = input
        .provincial
        .forward_filled()?
        .map_column(date, normalize_date)?;
    stats.provincial_rows = provincial.len();

    // Verified figures from the multi-period report, keyed by (date, route).
    let multi = input
        .multi_period
        .renamed(&config.multi_period_renames)?
        .map_column(date, normalize_date)?;
    let carried = multi.select(&carried_columns(&config.multi_period_renames))?;
    let Joined { table: summary, matches } = provincial.left_join(&carried, &keys, &keys)?;

    let verified = stage_figures(
        "verified",
        &summary,
        &config.label_column,
        &matches,
        &multi,
        catalog,
    )?;
    stats.verified_matched = verified.matched;
    stats.verified_filled = verified.filled;
    stats.unclassified_labels += verified.unclassified;
    stats.ambiguous_labels.extend(verified.ambiguous);
    let summary = summary
        .with_column(&config.verified_quantity_column, verified.quantities)?
        .with_column(&config.verified_share_column, verified.shares)?;

    // Review figures from the single-period report, matched on route alone.
    let single = input
        .single_period
        .renamed(&config.single_period_renames)?
        .map_column(&config.review_date_column, normalize_date)?;
    let carried = single.select(&carried_columns(&config.single_period_renames))?;
    let Joined { table: summary, matches } = summary.left_join(&carried, &[route], &[route])?;

    let labels = summary.column_values(&config.review_label_column)?;
    let mut review_labels: Vec<Cell> = Vec::with_capacity(summary.len());
    for (label, found) in labels.into_iter().zip(&matches) {
        if found.is_some() {
            stats.review_matched += 1;
            review_labels.push(label.map(str::to_string));
        } else {
            stats.review_resolved += 1;
            review_labels.push(Some(config.resolved_sentinel.clone()));
        }
    }
    let summary = summary.with_column(&config.review_label_column, review_labels)?;

    let review_keys = [
        config.review_date_column.as_str(),
        route,
        config.review_label_column.as_str(),
    ];
    let review_matches = summary.join_index(&single, &review_keys, &review_keys)?;
    let review = stage_figures(
        "review",
        &summary,
        &config.review_label_column,
        &review_matches,
        &single,
        catalog,
    )?;
    stats.review_filled = review.filled;
    stats.unclassified_labels += review.unclassified;
    stats.ambiguous_labels.extend(review.ambiguous);
    let summary = summary
        .with_column(&config.review_quantity_column, review.quantities)?
        .with_column(&config.review_share_column, review.shares)?;

    let (summary, full_route_matched) = apply_drift(config, summary, input.full_route)?;
    stats.full_route_matched = full_route_matched;

    let summary = validate_columns(&summary, &config.required_columns)?;
    info!(
        "provincial summary reconciled: {} rows, {} verified, {} review, {} resolved",
        format_count(stats.provincial_rows),
        stats.verified_filled,
        stats.review_filled,
        stats.review_resolved
    );
    Ok(Reconciliation { summary, stats })
}

/// Target names of a rename map: the columns a join carries over.
fn carried_columns(renames: &BTreeMap<String, String>) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for target in renames.values() {
        if !columns.contains(target) {
            columns.push(target.clone());
        }
    }
    columns
}

struct StageFill {
    quantities: Vec<Cell>,
    shares: Vec<Cell>,
    matched: usize,
    filled: usize,
    unclassified: usize,
    ambiguous: Vec<AmbiguousLabel>,
}

/// For every row of `rows`, classify its label and pull the selected stage's
/// quantity and share from the `source` row it was matched with.
fn stage_figures(
    origin: &str,
    rows: &Table,
    label_column: &str,
    matches: &[Option<usize>],
    source: &Table,
    catalog: &StageCatalog,
) -> Result<StageFill> {
    let labels = rows.column_values(label_column)?;

    let mut fill = StageFill {
        quantities: Vec::with_capacity(rows.len()),
        shares: Vec::with_capacity(rows.len()),
        matched: 0,
        filled: 0,
        unclassified: 0,
        ambiguous: Vec::new(),
    };

    for (label, source_row) in labels.into_iter().zip(matches) {
        let Some(source_row) = *source_row else {
            fill.quantities.push(None);
            fill.shares.push(None);
            continue;
        };
        fill.matched += 1;

        let label = label.unwrap_or_default();
        let classification = catalog.classify(label);
        let spec = match classification.selected {
            StageMatch::Stage(stage) => catalog.spec(stage),
            StageMatch::NoMatch => None,
        };
        if let (true, StageMatch::Stage(selected)) =
            (classification.is_ambiguous(), classification.selected)
        {
            if !fill.ambiguous.iter().any(|a| a.label == label) {
                warn!(
                    "{origin} label '{label}' names several stages {:?}; using {selected}",
                    classification.candidates
                );
                fill.ambiguous.push(AmbiguousLabel {
                    origin: origin.to_string(),
                    label: label.to_string(),
                    candidates: classification.candidates.clone(),
                    selected,
                });
            }
        }

        match spec {
            Some(spec) => {
                fill.filled += 1;
                fill.quantities
                    .push(source.value(source_row, &spec.quantity_column).map(str::to_string));
                fill.shares
                    .push(source.value(source_row, &spec.share_column).map(str::to_string));
            }
            None => {
                fill.unclassified += 1;
                fill.quantities.push(None);
                fill.shares.push(None);
            }
        }
    }
    debug!(
        "{origin} stage fill: {} matched, {} filled, {} unclassified",
        fill.matched, fill.filled, fill.unclassified
    );
    Ok(fill)
}

/// Join the full-route reference by route and compute the drift between its
/// rescaled diff and the provincial diff.
fn apply_drift(config: &SummaryConfig, summary: Table, full_route: &Table) -> Result<(Table, usize)> {
    let matches = summary.join_index(
        full_route,
        &[config.route_column.as_str()],
        &[config.full_route_route_column.as_str()],
    )?;
    let reference_diffs = full_route.column_values(&config.full_route_diff_column)?;
    let provincial_diffs = if summary.has_column(&config.diff_column) {
        summary.column_values(&config.diff_column)?
    } else {
        vec![None; summary.len()]
    };

    let mut reference: Vec<Cell> = Vec::with_capacity(summary.len());
    let mut change: Vec<Cell> = Vec::with_capacity(summary.len());
    let mut matched = 0usize;
    for (reference_row, provincial_diff) in matches.iter().zip(provincial_diffs) {
        let Some(reference_row) = *reference_row else {
            reference.push(None);
            change.push(None);
            continue;
        };
        matched += 1;
        let scaled = parse_number_cell(reference_diffs[reference_row]).unwrap_or(0.0);
        let full_ratio = rescale(scaled, config.full_route_scale);
        let provincial_ratio = parse_percent_cell(provincial_diff);
        reference.push(Some(format_percent(full_ratio)));
        change.push(Some(format_percent(full_ratio - provincial_ratio)));
    }

    let summary = summary
        .with_column(&config.full_route_output_column, reference)?
        .with_column(&config.diff_change_column, change)?;
    Ok((summary, matched))
}

/// Project to the configured output columns, failing with every missing name
/// when the computed table does not provide them all.
pub fn validate_columns(summary: &Table, required: &[String]) -> Result<Table> {
    let mut missing: Vec<String> = Vec::new();
    for column in required {
        if !summary.has_column(column) && !missing.contains(column) {
            missing.push(column.clone());
        }
    }
    if !missing.is_empty() {
        error!("summary is missing required columns: {}", missing.join(", "));
        return Err(ReportError::SchemaIntegrity { missing });
    }
    Ok(summary.select(required)?.with_name("summary"))
}
