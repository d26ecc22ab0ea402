//! Row-by-row reconciliation of one entity across the loaded sources.
//!
//! For every feature in the entity's canonical order this module collects the
//! per-source cell values, classifies their agreement, derives a default
//! resolved value, and accumulates the per-source disagreement statistics
//! against the reference source. Pure functions of the session — repeated
//! calls with an unchanged session produce identical output.
//!
//! Classification rules:
//!
//! - Every empty cell is a distinct placeholder. It never equals another
//!   empty cell or any real value, so a row with a missing cell can only be
//!   "same" if it has no missing cells at all.
//! - **Same**: one distinct token across all columns, and it is a real value.
//!   The resolved default is the reference source's value, verbatim.
//! - **Different**: as many distinct tokens as columns. No resolved default.
//! - **Partial**: everything in between. The resolved default is the
//!   most frequent non-empty value; on frequency ties the running-maximum
//!   scan keeps the latest qualifying source in slot order.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::session::LoadSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Same,
    Partial,
    Different,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Same => "same",
            Classification::Partial => "partial",
            Classification::Different => "different",
        }
    }
}

/// One reconciled feature row for an entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowResult {
    pub feature: String,
    /// Raw cell values, one per participating source.
    pub values: Vec<String>,
    pub classification: Classification,
    /// Computed default final value; empty when nothing could be derived.
    pub resolved: String,
    /// Per-source agreement with the reference value. Index 0 is always
    /// `None`; `None` elsewhere means the pair was not comparable (one side
    /// empty), `Some(true)` means the source disagrees with the reference.
    pub diff_flags: Vec<Option<bool>>,
}

/// Compared/differs counters for one non-reference source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceDiff {
    pub compared: usize,
    pub differs: usize,
}

impl SourceDiff {
    /// Disagreement share, one decimal. A source with nothing comparable
    /// reports a literal `0%` rather than dividing by zero.
    pub fn percent(&self) -> String {
        if self.compared == 0 {
            "0%".to_string()
        } else {
            format!(
                "{:.1}%",
                (self.differs as f64 / self.compared as f64) * 100.0
            )
        }
    }
}

/// Aggregate KPIs for one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntitySummary {
    pub total_features: usize,
    pub same: usize,
    pub partial: usize,
    pub different: usize,
    pub missing_cells: usize,
    /// One entry per non-reference source, in slot order.
    pub source_diffs: Vec<SourceDiff>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityReport {
    pub entity: String,
    pub rows: Vec<RowResult>,
    pub summary: EntitySummary,
}

/// Distinctness token: real values compare by (possibly case-folded)
/// content, empty cells only by column position.
#[derive(Debug, PartialEq, Eq, Hash)]
enum Token {
    Value(String),
    Empty(usize),
}

/// Builds the ordered row sequence for `entity`. Unknown entities and
/// entities without canonical features yield an empty sequence.
pub fn build_rows(session: &LoadSession, entity: &str) -> Vec<RowResult> {
    session
        .features(entity)
        .iter()
        .map(|feature| build_row(session, entity, feature))
        .collect()
}

/// Builds rows and the KPI summary for `entity` in one pass.
pub fn reconcile_entity(session: &LoadSession, entity: &str) -> EntityReport {
    let columns = session.column_count();
    let rows = build_rows(session, entity);

    let mut summary = EntitySummary {
        total_features: rows.len(),
        source_diffs: vec![SourceDiff::default(); columns - 1],
        ..EntitySummary::default()
    };
    for row in &rows {
        match row.classification {
            Classification::Same => summary.same += 1,
            Classification::Partial => summary.partial += 1,
            Classification::Different => summary.different += 1,
        }
        summary.missing_cells += row.values.iter().filter(|v| v.is_empty()).count();
        for (source, flag) in row.diff_flags.iter().enumerate().skip(1) {
            if let Some(differs) = flag {
                let diff = &mut summary.source_diffs[source - 1];
                diff.compared += 1;
                if *differs {
                    diff.differs += 1;
                }
            }
        }
    }

    EntityReport {
        entity: entity.to_string(),
        rows,
        summary,
    }
}

fn build_row(session: &LoadSession, entity: &str, feature: &str) -> RowResult {
    let columns = session.column_count();
    let case_sensitive = session.options.case_sensitive;
    let values: Vec<String> = (0..columns)
        .map(|source| session.cell(source, entity, feature).to_string())
        .collect();

    let tokens: HashSet<Token> = values
        .iter()
        .enumerate()
        .map(|(col, value)| {
            if value.is_empty() {
                Token::Empty(col)
            } else {
                Token::Value(normalize(value, case_sensitive))
            }
        })
        .collect();

    let all_present_same = tokens.len() == 1 && !values[0].is_empty();
    let (classification, resolved) = if all_present_same {
        (Classification::Same, values[0].clone())
    } else if tokens.len() == values.len() {
        (Classification::Different, String::new())
    } else {
        (
            Classification::Partial,
            resolve_by_frequency(&values, case_sensitive),
        )
    };

    let mut diff_flags = vec![None; columns];
    if !values[0].is_empty() {
        let reference = normalize(&values[0], case_sensitive);
        for (source, value) in values.iter().enumerate().skip(1) {
            if !value.is_empty() {
                diff_flags[source] = Some(normalize(value, case_sensitive) != reference);
            }
        }
    }

    RowResult {
        feature: feature.to_string(),
        values,
        classification,
        resolved,
        diff_flags,
    }
}

/// Most frequent non-empty value; the `>=` running-maximum scan means a
/// later source wins a frequency tie.
fn resolve_by_frequency(values: &[String], case_sensitive: bool) -> String {
    let mut frequency: HashMap<String, usize> = HashMap::new();
    for value in values {
        if !value.is_empty() {
            *frequency.entry(normalize(value, case_sensitive)).or_insert(0) += 1;
        }
    }

    let mut best = String::new();
    let mut max_frequency = 0;
    for value in values {
        if value.is_empty() {
            continue;
        }
        let count = frequency[&normalize(value, case_sensitive)];
        if count >= max_frequency {
            max_frequency = count;
            best = value.clone();
        }
    }
    best
}

fn normalize(value: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        value.to_string()
    } else {
        value.to_lowercase()
    }
}
