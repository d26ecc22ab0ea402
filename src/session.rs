//! Ingestion state for one load of comparison sources.
//!
//! A [`LoadSession`] owns everything a load produces: the per-source
//! entity→feature→value maps, the canonical per-entity feature order, and the
//! entity list. Sessions are built fresh per load and never shared across
//! loads, so stale data from an earlier load cannot leak into a new one.
//!
//! The reference source (index 0) has two special roles: its header row
//! defines the entity universe, and the top-to-bottom first appearance of
//! feature labels in it defines the canonical feature order per entity.
//! Non-reference sources contribute cell values only.

use std::{collections::HashMap, path::PathBuf};

use anyhow::{Result, anyhow};
use encoding_rs::Encoding;
use log::{debug, info};

use crate::grid;

/// Reference source plus two mandatory companions.
pub const MANDATORY_SOURCES: usize = 3;
/// One optional fourth slot on top of the mandatory three.
pub const MAX_SOURCES: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
    /// Compare values verbatim (`true`) or case-folded (`false`).
    /// Display and resolution keep the original casing either way.
    pub case_sensitive: bool,
    /// Trim whitespace from header-row entity names.
    pub trim_headers: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            trim_headers: true,
        }
    }
}

#[derive(Debug)]
pub struct LoadSession {
    pub options: IngestOptions,
    /// Display names, one per supplied source.
    pub source_names: Vec<String>,
    /// Whether the optional fourth source participates downstream.
    pub fourth_active: bool,
    /// entity → feature → cell value, one map per source slot.
    cells: Vec<HashMap<String, HashMap<String, String>>>,
    /// Entities in reference-header order, duplicates removed.
    entities: Vec<String>,
    /// Canonical feature order per entity, first-seen in the reference source.
    feature_order: HashMap<String, Vec<String>>,
}

impl LoadSession {
    pub fn new(options: IngestOptions) -> Self {
        Self {
            options,
            source_names: (1..=MAX_SOURCES).map(|i| format!("Data {i}")).collect(),
            fourth_active: false,
            cells: vec![HashMap::new(); MAX_SOURCES],
            entities: Vec::new(),
            feature_order: HashMap::new(),
        }
    }

    /// Reads and ingests 3–4 source files into a fresh session.
    ///
    /// Sources are keyed by their position in `paths`, so ingestion order and
    /// slot assignment can never disagree. Any unreadable or unsupported
    /// source aborts the whole load.
    pub fn load(
        paths: &[PathBuf],
        options: IngestOptions,
        delimiter: Option<u8>,
        encoding: &'static Encoding,
    ) -> Result<Self> {
        if paths.len() < MANDATORY_SOURCES {
            return Err(anyhow!(
                "At least {MANDATORY_SOURCES} source files are required (reference plus two), got {}",
                paths.len()
            ));
        }
        if paths.len() > MAX_SOURCES {
            return Err(anyhow!(
                "At most {MAX_SOURCES} source files are supported, got {}",
                paths.len()
            ));
        }

        let mut session = Self::new(options);
        session.fourth_active = paths.len() == MAX_SOURCES;
        for (source_index, path) in paths.iter().enumerate() {
            let grid = grid::read_grid(path, delimiter, encoding)?;
            debug!(
                "Source {} ({:?}): {} raw row(s)",
                source_index + 1,
                path,
                grid.len()
            );
            session.ingest_grid(&grid, source_index);
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                session.source_names[source_index] = name.to_string();
            }
        }
        info!(
            "Loaded {} source(s): {} entities",
            paths.len(),
            session.entities.len()
        );
        Ok(session)
    }

    /// Ingests one grid into the given source slot.
    ///
    /// Lenient by policy: grids without at least a header and one data row
    /// are a no-op, and malformed rows (short, or with an empty feature
    /// label) are skipped without comment.
    pub fn ingest_grid(&mut self, grid: &[Vec<String>], source_index: usize) {
        if grid.len() < 2 {
            return;
        }
        let header = &grid[0];
        let entity_names: Vec<String> = header
            .iter()
            .skip(1)
            .map(|name| self.header_name(name))
            .collect();

        for name in &entity_names {
            if name.is_empty() {
                continue;
            }
            self.cells[source_index].entry(name.clone()).or_default();
            if source_index == 0 {
                if !self.entities.contains(name) {
                    self.entities.push(name.clone());
                }
                self.feature_order.entry(name.clone()).or_default();
            }
        }

        for row in &grid[1..] {
            if row.len() < 2 {
                continue;
            }
            let feature = row[0].trim();
            if feature.is_empty() {
                continue;
            }
            let columns = row.len().min(header.len());
            for col in 1..columns {
                let entity = &entity_names[col - 1];
                let Some(features) = self.cells[source_index].get_mut(entity) else {
                    continue;
                };
                features.insert(feature.to_string(), row[col].trim().to_string());

                if source_index == 0 {
                    let order = self
                        .feature_order
                        .get_mut(entity)
                        .expect("reference entity registered at header time");
                    if !order.iter().any(|f| f == feature) {
                        order.push(feature.to_string());
                    }
                }
            }
        }
    }

    fn header_name(&self, raw: &str) -> String {
        if self.options.trim_headers {
            raw.trim().to_string()
        } else {
            raw.to_string()
        }
    }

    /// Number of columns every downstream row carries (3, or 4 when the
    /// optional source was supplied).
    pub fn column_count(&self) -> usize {
        if self.fourth_active {
            MAX_SOURCES
        } else {
            MANDATORY_SOURCES
        }
    }

    /// Entities in reference-header order.
    pub fn entities(&self) -> &[String] {
        &self.entities
    }

    /// Canonical feature order for an entity; empty for unknown entities.
    pub fn features(&self, entity: &str) -> &[String] {
        self.feature_order
            .get(entity)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Cell value at (source, entity, feature); absent cells are the empty
    /// string — the data model does not distinguish unset from empty.
    pub fn cell(&self, source_index: usize, entity: &str, feature: &str) -> &str {
        self.cells[source_index]
            .get(entity)
            .and_then(|features| features.get(feature))
            .map(String::as_str)
            .unwrap_or_default()
    }
}
