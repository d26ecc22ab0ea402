//! Final-value export: one entity as (feature, value) pairs, or every entity
//! side by side. Reads the reconciliation engine and the override store
//! directly — no presentation state is consulted or rebuilt.

use std::{collections::HashMap, path::Path};

use anyhow::{Context, Result, anyhow};
use itertools::Itertools;
use log::info;
use rust_xlsxwriter::Workbook;

use crate::{
    cli::{ExportAllArgs, ExportArgs},
    io_utils, reconcile,
    session::LoadSession,
    store::{FinalStore, KeyValueStore},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExportFormat {
    Csv,
    Workbook,
}

fn resolve_format(path: Option<&Path>) -> ExportFormat {
    match path
        .and_then(|p| p.extension())
        .and_then(|ext| ext.to_str())
    {
        Some(ext) if ext.eq_ignore_ascii_case("xlsx") => ExportFormat::Workbook,
        _ => ExportFormat::Csv,
    }
}

/// Final values for one entity, in canonical feature order.
/// Stored overrides win over computed defaults.
pub fn export_single<S: KeyValueStore>(
    session: &LoadSession,
    store: &FinalStore<S>,
    entity: &str,
) -> Vec<(String, String)> {
    reconcile::build_rows(session, entity)
        .into_iter()
        .map(|row| {
            let value = store
                .final_value(entity, &row.feature)
                .map(str::to_string)
                .unwrap_or(row.resolved);
            (row.feature, value)
        })
        .collect()
}

/// Final values for every entity: header row plus one row per feature in the
/// first-seen union of all entities' canonical orders. An entity whose
/// canonical order never contained a feature contributes an empty cell.
pub fn export_all<S: KeyValueStore>(
    session: &LoadSession,
    store: &FinalStore<S>,
) -> (Vec<String>, Vec<Vec<String>>) {
    let entities = session.entities();
    let union: Vec<&String> = entities
        .iter()
        .flat_map(|entity| session.features(entity))
        .unique()
        .collect();

    let resolved: HashMap<&String, HashMap<String, String>> = entities
        .iter()
        .map(|entity| {
            let defaults = reconcile::build_rows(session, entity)
                .into_iter()
                .map(|row| (row.feature, row.resolved))
                .collect();
            (entity, defaults)
        })
        .collect();

    let mut header = vec!["Feature".to_string()];
    header.extend(entities.iter().cloned());

    let rows = union
        .into_iter()
        .map(|feature| {
            let mut row = vec![feature.clone()];
            for entity in entities {
                let cell = match resolved[entity].get(feature.as_str()) {
                    Some(default) => store
                        .final_value(entity, feature)
                        .map(str::to_string)
                        .unwrap_or_else(|| default.clone()),
                    None => String::new(),
                };
                row.push(cell);
            }
            row
        })
        .collect();

    (header, rows)
}

pub fn execute(args: &ExportArgs) -> Result<()> {
    let session = crate::load_session(&args.sources)?;
    let store = crate::open_source_store(&args.sources)?;
    let entity = resolve_entity(&session, args.entity.as_deref())?;

    let pairs = export_single(&session, &store, &entity);
    let header = vec!["Feature".to_string(), "Final Data".to_string()];
    let rows: Vec<Vec<String>> = pairs
        .into_iter()
        .map(|(feature, value)| vec![feature, value])
        .collect();

    write_output(args.output.as_deref(), &header, &rows)?;
    info!(
        "Exported {} row(s) for entity '{}'",
        rows.len(),
        entity
    );
    Ok(())
}

pub fn execute_all(args: &ExportAllArgs) -> Result<()> {
    let session = crate::load_session(&args.sources)?;
    let store = crate::open_source_store(&args.sources)?;

    let (header, rows) = export_all(&session, &store);
    write_output(args.output.as_deref(), &header, &rows)?;
    info!(
        "Exported {} feature row(s) across {} entities",
        rows.len(),
        session.entities().len()
    );
    Ok(())
}

fn resolve_entity(session: &LoadSession, requested: Option<&str>) -> Result<String> {
    match requested {
        Some(name) => {
            if session.entities().iter().any(|entity| entity == name) {
                Ok(name.to_string())
            } else {
                Err(anyhow!(
                    "Entity '{name}' does not appear in the reference source"
                ))
            }
        }
        None => session
            .entities()
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("No entities were loaded from the reference source")),
    }
}

fn write_output(path: Option<&Path>, header: &[String], rows: &[Vec<String>]) -> Result<()> {
    match resolve_format(path) {
        ExportFormat::Csv => write_csv(path, header, rows),
        ExportFormat::Workbook => {
            let path = path.expect("workbook format implies an output path");
            write_workbook(path, header, rows)
        }
    }
}

fn write_csv(path: Option<&Path>, header: &[String], rows: &[Vec<String>]) -> Result<()> {
    let mut writer = io_utils::open_csv_writer(path, io_utils::DEFAULT_CSV_DELIMITER)?;
    writer
        .write_record(header.iter())
        .context("Writing export header")?;
    for (row_idx, row) in rows.iter().enumerate() {
        writer
            .write_record(row.iter())
            .with_context(|| format!("Writing export row {}", row_idx + 1))?;
    }
    writer.flush().context("Flushing export output")?;
    Ok(())
}

fn write_workbook(path: &Path, header: &[String], rows: &[Vec<String>]) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook
        .add_worksheet()
        .set_name("Final Data")
        .map_err(|e| anyhow!("Naming worksheet: {e}"))?;

    for (col, title) in header.iter().enumerate() {
        worksheet
            .write_string(0, col as u16, title)
            .map_err(|e| anyhow!("Writing header cell {col}: {e}"))?;
    }
    for (row_idx, row) in rows.iter().enumerate() {
        for (col, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32 + 1, col as u16, value)
                .map_err(|e| anyhow!("Writing cell ({}, {col}): {e}", row_idx + 1))?;
        }
    }

    workbook
        .save(path)
        .map_err(|e| anyhow!("Saving workbook {path:?}: {e}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        session::IngestOptions,
        store::{JsonFileStore, open_store_unchecked},
    };

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect()
    }

    fn two_entity_session() -> LoadSession {
        let mut session = LoadSession::new(IngestOptions::default());
        session.ingest_grid(
            &grid(&[
                &["Feature", "CarA", "CarB"],
                &["f1", "a1", ""],
                &["f2", "a2", "b2"],
                &["f3", "", "b3"],
            ]),
            0,
        );
        session.ingest_grid(
            &grid(&[
                &["Feature", "CarA", "CarB"],
                &["f1", "a1", ""],
                &["f2", "a2", "b2"],
                &["f3", "", "b3"],
            ]),
            1,
        );
        session.ingest_grid(
            &grid(&[
                &["Feature", "CarA", "CarB"],
                &["f1", "a1", ""],
                &["f2", "a2", "b2"],
                &["f3", "", "b3"],
            ]),
            2,
        );
        session
    }

    fn empty_store(dir: &tempfile::TempDir) -> FinalStore<JsonFileStore> {
        open_store_unchecked(&dir.path().join("store.json")).expect("open store")
    }

    #[test]
    fn single_export_prefers_stored_final_values() {
        let dir = tempfile::tempdir().expect("temp dir");
        let session = two_entity_session();
        let mut store = empty_store(&dir);
        store.set_final("CarA", "f1", "edited").unwrap();

        let pairs = export_single(&session, &store, "CarA");
        assert_eq!(pairs[0], ("f1".to_string(), "edited".to_string()));
        // Unedited rows fall back to the computed default.
        assert_eq!(pairs[1], ("f2".to_string(), "a2".to_string()));
    }

    #[test]
    fn union_export_preserves_first_seen_feature_order() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut session = LoadSession::new(IngestOptions::default());
        // A orders (f1, f2); B orders (f2, f3) — union must be f1, f2, f3.
        session.ingest_grid(
            &grid(&[
                &["Feature", "A", "B"],
                &["f1", "x", ""],
                &["f2", "y", "p"],
                &["f3", "", "q"],
            ]),
            0,
        );
        let store = empty_store(&dir);

        let (header, rows) = export_all(&session, &store);
        assert_eq!(header, vec!["Feature", "A", "B"]);
        let features: Vec<&str> = rows.iter().map(|row| row[0].as_str()).collect();
        assert_eq!(features, vec!["f1", "f2", "f3"]);
    }

    #[test]
    fn union_export_blanks_features_outside_an_entitys_order() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut session = LoadSession::new(IngestOptions::default());
        for source in 0..3 {
            session.ingest_grid(
                &grid(&[&["Feature", "A", "B"], &["f1", "x", ""], &["f2", "", "p"]]),
                source,
            );
        }
        let mut store = empty_store(&dir);
        // An override for a feature outside every canonical order stays invisible.
        store.set_final("B", "missing", "ghost").unwrap();

        let (_, rows) = export_all(&session, &store);
        let by_feature: HashMap<&str, &Vec<String>> =
            rows.iter().map(|row| (row[0].as_str(), row)).collect();
        assert_eq!(by_feature["f1"][1], "x");
        assert_eq!(by_feature["f1"][2], "");
        assert_eq!(by_feature["f2"][2], "p");
        assert!(!rows.iter().any(|row| row[0] == "missing"));
    }

    #[test]
    fn resolve_entity_defaults_to_first_and_validates_names() {
        let session = two_entity_session();
        assert_eq!(resolve_entity(&session, None).unwrap(), "CarA");
        assert_eq!(resolve_entity(&session, Some("CarB")).unwrap(), "CarB");
        assert!(resolve_entity(&session, Some("CarZ")).is_err());

        let empty = LoadSession::new(IngestOptions::default());
        assert!(resolve_entity(&empty, None).is_err());
    }

    #[test]
    fn resolve_format_dispatches_on_extension() {
        assert_eq!(resolve_format(None), ExportFormat::Csv);
        assert_eq!(
            resolve_format(Some(Path::new("out.csv"))),
            ExportFormat::Csv
        );
        assert_eq!(
            resolve_format(Some(Path::new("out.XLSX"))),
            ExportFormat::Workbook
        );
    }
}
