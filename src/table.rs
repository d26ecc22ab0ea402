use std::borrow::Cow;
use std::fmt::Write as _;

/// ANSI palette for classification-colored cells. Colors mirror the
/// agreement taxonomy: green all-same, yellow partial, red all-different,
/// blue missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellColor {
    Green,
    Yellow,
    Red,
    Blue,
}

impl CellColor {
    fn code(&self) -> &'static str {
        match self {
            CellColor::Green => "\u{1b}[32m",
            CellColor::Yellow => "\u{1b}[33m",
            CellColor::Red => "\u{1b}[31m",
            CellColor::Blue => "\u{1b}[34m",
        }
    }
}

pub fn paint(value: &str, color: CellColor) -> String {
    format!("{}{}\u{1b}[0m", color.code(), value)
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    let mut output = String::new();

    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let separator = widths
        .iter()
        .map(|w| "-".repeat((*w).max(1)))
        .collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }

    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut cells = Vec::with_capacity(values.len());
    for (idx, value) in values.iter().enumerate() {
        let Some(width) = widths.get(idx).copied() else {
            break;
        };
        let sanitized = sanitize_cell(value);
        let padding = width.saturating_sub(display_width(sanitized.as_ref()));
        let mut cell = sanitized.into_owned();
        cell.push_str(&" ".repeat(padding));
        cells.push(cell);
    }
    let mut line = cells.join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}

/// Printable width of a cell, skipping over ANSI color sequences so painted
/// cells line up with plain ones.
fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(
            value
                .chars()
                .map(|ch| match ch {
                    '\n' | '\r' | '\t' => ' ',
                    other => other,
                })
                .collect(),
        )
    } else {
        Cow::Borrowed(value)
    }
}
