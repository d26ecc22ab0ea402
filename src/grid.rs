//! Tabular source reading: one uploaded file in, one 2D grid of strings out.
//!
//! Row 0 of a grid is the header (column 0 is the feature-label column,
//! columns 1..N are entity names); subsequent rows carry a feature name in
//! column 0 and one cell value per entity column. Delimited text is parsed
//! with the `csv` crate, workbook formats with `calamine` (first sheet only).
//! What the grid *means* is entirely the ingestor's business — this module
//! never interprets cells.

use std::path::Path;

use anyhow::{Context, Result};
use calamine::{Data, Reader, open_workbook_auto};
use encoding_rs::Encoding;
use thiserror::Error;

use crate::io_utils;

#[derive(Debug, Error)]
pub enum GridError {
    #[error("Unsupported file format '{0}'. Supported extensions: csv, tsv, xls, xlsx, xlsb, ods")]
    UnsupportedExtension(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Delimited,
    Workbook,
}

/// Classifies a path by extension. Unknown extensions are a hard error: a
/// source slot that can never be filled must abort the load instead of
/// leaving it incomplete.
pub fn detect_format(path: &Path) -> Result<SourceFormat, GridError> {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();
    if ext.eq_ignore_ascii_case("csv") || ext.eq_ignore_ascii_case("tsv") {
        Ok(SourceFormat::Delimited)
    } else if ["xls", "xlsx", "xlsb", "ods"]
        .iter()
        .any(|candidate| ext.eq_ignore_ascii_case(candidate))
    {
        Ok(SourceFormat::Workbook)
    } else {
        Err(GridError::UnsupportedExtension(
            path.display().to_string(),
        ))
    }
}

/// Reads a source file into a 2D grid of strings.
///
/// `delimiter` and `encoding` only apply to delimited text; workbooks carry
/// their own cell typing and are stringified here.
pub fn read_grid(
    path: &Path,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
) -> Result<Vec<Vec<String>>> {
    match detect_format(path)? {
        SourceFormat::Delimited => {
            let delimiter = io_utils::resolve_input_delimiter(path, delimiter);
            read_delimited(path, delimiter, encoding)
        }
        SourceFormat::Workbook => read_workbook(path),
    }
}

fn read_delimited(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<Vec<Vec<String>>> {
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
    let mut grid = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record =
            record.with_context(|| format!("Reading row {} in {path:?}", row_idx + 1))?;
        grid.push(io_utils::decode_record(&record, encoding)?);
    }
    Ok(grid)
}

fn read_workbook(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("Opening workbook {path:?}"))?;
    // First sheet only; a workbook without sheets degrades to an empty grid.
    let Some(sheet_name) = workbook.sheet_names().first().cloned() else {
        return Ok(Vec::new());
    };
    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("Reading sheet '{sheet_name}' in {path:?}"))?;

    let mut grid = Vec::with_capacity(range.height());
    for row in range.rows() {
        grid.push(row.iter().map(stringify_cell).collect());
    }
    Ok(grid)
}

fn stringify_cell(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                n.to_string()
            }
        }
        Data::Int(n) => n.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::Error(e) => format!("#{e:?}"),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}
