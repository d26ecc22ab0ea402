//! I/O plumbing for CSV reading, writing, encoding, and delimiter resolution.
//!
//! All delimited-text I/O in table-recon flows through this module:
//!
//! - **Delimiter resolution**: extension-based auto-detection (`.csv` → comma,
//!   `.tsv` → tab) with manual override support.
//! - **Encoding**: input decoding via `encoding_rs`, defaulting to UTF-8.
//!   Output is always UTF-8.
//! - **Reader/writer construction**: readers tolerate ragged rows (short or
//!   long data rows are a skip condition for the ingestor, not a parse
//!   failure); writers quote every field for round-trip safety.
//! - **stdout**: an omitted output path routes CSV output to standard out.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(
    path: &Path,
    delimiter: u8,
) -> Result<csv::Reader<BufReader<File>>> {
    let reader =
        BufReader::new(File::open(path).with_context(|| format!("Opening input file {path:?}"))?);
    Ok(open_csv_reader(reader, delimiter))
}

pub fn open_csv_writer(path: Option<&Path>, delimiter: u8) -> Result<csv::Writer<Box<dyn Write>>> {
    let target: Box<dyn Write> = match path {
        Some(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        None => Box::new(std::io::stdout()),
    };

    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Always)
        .double_quote(true);
    Ok(builder.from_writer(target))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn resolve_input_delimiter_prefers_override() {
        let path = PathBuf::from("data.tsv");
        assert_eq!(resolve_input_delimiter(&path, Some(b';')), b';');
        assert_eq!(resolve_input_delimiter(&path, None), b'\t');
        assert_eq!(
            resolve_input_delimiter(&PathBuf::from("data.csv"), None),
            b','
        );
    }

    #[test]
    fn resolve_encoding_rejects_unknown_labels() {
        assert!(resolve_encoding(Some("utf-8")).is_ok());
        assert!(resolve_encoding(Some("windows-1252")).is_ok());
        assert!(resolve_encoding(Some("klingon")).is_err());
        assert_eq!(resolve_encoding(None).unwrap(), UTF_8);
    }

    #[test]
    fn decode_bytes_honours_encoding() {
        let latin1 = encoding_rs::WINDOWS_1252;
        let decoded = decode_bytes(&[0xE9], latin1).unwrap();
        assert_eq!(decoded, "é");
    }
}
