//! Stdout rendering for the reconcile, stats, and probe commands.
//!
//! Strictly a consumer of engine output: every number printed here was
//! computed by the reconciliation engine, and stored overrides are overlaid
//! on displayed cells without ever feeding back into classification.

use std::io::IsTerminal;

use crate::{
    cli::ColorMode,
    reconcile::{self, Classification, EntityReport},
    session::LoadSession,
    store::{FinalStore, KeyValueStore},
    table::{self, CellColor},
};

pub fn use_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => std::io::stdout().is_terminal(),
    }
}

fn class_color(classification: Classification) -> CellColor {
    match classification {
        Classification::Same => CellColor::Green,
        Classification::Partial => CellColor::Yellow,
        Classification::Different => CellColor::Red,
    }
}

/// Prints the comparison table and KPI block for one entity.
///
/// `feature_filter` hides non-matching rows from the table only; the KPI
/// block always reflects the whole entity.
pub fn print_entity_report<S: KeyValueStore>(
    session: &LoadSession,
    report: &EntityReport,
    store: &FinalStore<S>,
    color: bool,
    feature_filter: Option<&str>,
) {
    let columns = session.column_count();
    let mut headers = vec!["Feature".to_string()];
    headers.extend(session.source_names.iter().take(columns).cloned());
    headers.push("Status".to_string());
    headers.push("Final".to_string());

    let needle = feature_filter.map(str::to_lowercase);
    let rows: Vec<Vec<String>> = report
        .rows
        .iter()
        .filter(|row| match &needle {
            Some(needle) => row.feature.to_lowercase().contains(needle),
            None => true,
        })
        .map(|row| {
            let mut cells = vec![row.feature.clone()];
            for (source, value) in row.values.iter().enumerate() {
                let shown = store
                    .column_value(&report.entity, &row.feature, source)
                    .unwrap_or(value.as_str());
                if shown.is_empty() {
                    cells.push(String::new());
                } else if color {
                    cells.push(table::paint(shown, class_color(row.classification)));
                } else {
                    cells.push(shown.to_string());
                }
            }
            let status = if color {
                table::paint(
                    row.classification.as_str(),
                    class_color(row.classification),
                )
            } else {
                row.classification.as_str().to_string()
            };
            cells.push(status);
            cells.push(
                store
                    .final_value(&report.entity, &row.feature)
                    .unwrap_or(row.resolved.as_str())
                    .to_string(),
            );
            cells
        })
        .collect();

    println!("Entity: {}", report.entity);
    table::print_table(&headers, &rows);
    println!();
    print_summary_block(session, report);
}

fn print_summary_block(session: &LoadSession, report: &EntityReport) {
    let summary = &report.summary;
    println!("Total Features: {}", summary.total_features);
    println!(
        "Same: {}  Partial: {}  Different: {}",
        summary.same, summary.partial, summary.different
    );
    println!("Missing Cells: {}", summary.missing_cells);
    for (idx, diff) in summary.source_diffs.iter().enumerate() {
        println!(
            "{} Diff: {}",
            session.source_names[idx + 1],
            diff.percent()
        );
    }
}

/// One KPI row per entity, every entity in reference order.
pub fn print_stats(session: &LoadSession) {
    let columns = session.column_count();
    let mut headers = vec![
        "Entity".to_string(),
        "Features".to_string(),
        "Same".to_string(),
        "Partial".to_string(),
        "Different".to_string(),
        "Missing".to_string(),
    ];
    for name in session.source_names.iter().take(columns).skip(1) {
        headers.push(format!("{name} Diff"));
    }

    let rows: Vec<Vec<String>> = session
        .entities()
        .iter()
        .map(|entity| {
            let report = reconcile::reconcile_entity(session, entity);
            let summary = &report.summary;
            let mut row = vec![
                entity.clone(),
                summary.total_features.to_string(),
                summary.same.to_string(),
                summary.partial.to_string(),
                summary.different.to_string(),
                summary.missing_cells.to_string(),
            ];
            row.extend(summary.source_diffs.iter().map(|diff| diff.percent()));
            row
        })
        .collect();

    table::print_table(&headers, &rows);
}

/// Entity universe and per-source cell coverage.
pub fn print_probe(session: &LoadSession) {
    let columns = session.column_count();
    let mut headers = vec!["Entity".to_string(), "Features".to_string()];
    headers.extend(session.source_names.iter().take(columns).cloned());

    let rows: Vec<Vec<String>> = session
        .entities()
        .iter()
        .map(|entity| {
            let features = session.features(entity);
            let mut row = vec![entity.clone(), features.len().to_string()];
            for source in 0..columns {
                let present = features
                    .iter()
                    .filter(|feature| !session.cell(source, entity, feature).is_empty())
                    .count();
                row.push(format!("{present}/{}", features.len()));
            }
            row
        })
        .collect();

    table::print_table(&headers, &rows);
}
