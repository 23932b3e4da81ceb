use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};

use super::filter::{self, ParseStats};
use super::model::{Channel, Trace};
use crate::config::{ColumnRoles, Delimiter, TraceFormat};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load one instrument export as a [`Trace`].
///
/// The first `format.skip_rows` lines are discarded unread. Every remaining
/// row is coerced to numbers on the columns named by `format.columns`; rows
/// that fail are dropped and counted in the returned [`ParseStats`].
///
/// Errors with [`AnalysisError::InsufficientData`] or
/// [`AnalysisError::ZeroSpacing`] (wrapped in `anyhow`) when the cleaned rows
/// cannot form a usable trace.
///
/// [`AnalysisError::InsufficientData`]: crate::error::AnalysisError::InsufficientData
/// [`AnalysisError::ZeroSpacing`]: crate::error::AnalysisError::ZeroSpacing
pub fn load_trace(path: &Path, format: &TraceFormat) -> Result<(Trace, ParseStats)> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    read_trace(file, format).with_context(|| format!("reading {}", path.display()))
}

/// Same as [`load_trace`] over any reader.
pub fn read_trace<R: Read>(reader: R, format: &TraceFormat) -> Result<(Trace, ParseStats)> {
    let mut reader = BufReader::new(reader);
    skip_lines(&mut reader, format.skip_rows)?;

    let rows = match format.delimiter {
        Delimiter::Comma => read_comma_rows(reader, &format.columns)?,
        Delimiter::Whitespace => read_whitespace_rows(reader, &format.columns)?,
    };

    let (rows, stats) = filter::clean_rows(rows, format.dedup_x);
    filter::check_usable(&rows)?;

    Ok((rows_to_trace(rows, &format.columns), stats))
}

// ---------------------------------------------------------------------------
// Row readers
// ---------------------------------------------------------------------------

/// One row as read: `Some` values per role (x first, then each y), `None`
/// when that field was missing or not a number.
pub(crate) type RawRow = Vec<Option<f64>>;

fn skip_lines<R: BufRead>(reader: &mut R, n: usize) -> Result<()> {
    let mut buf = Vec::new();
    for i in 0..n {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .with_context(|| format!("skipping header line {}", i + 1))?;
        if read == 0 {
            break;
        }
    }
    Ok(())
}

/// Comma-separated body. Instrument headers often carry a different number
/// of fields than the data, so the reader is flexible about row length.
///
/// Records are read as bytes and decoded per field: a line that is not
/// valid UTF-8 or fails to parse becomes a malformed row. Only I/O errors
/// abort the file.
fn read_comma_rows<R: Read>(reader: R, roles: &ColumnRoles) -> Result<Vec<RawRow>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    let mut record = csv::ByteRecord::new();
    loop {
        match csv_reader.read_byte_record(&mut record) {
            Ok(false) => break,
            Ok(true) => rows.push(pick_columns(
                |i| record.get(i).and_then(|f| std::str::from_utf8(f).ok()),
                roles,
            )),
            Err(e) if e.is_io_error() => {
                return Err(e).with_context(|| format!("CSV row {}", rows.len()))
            }
            Err(e) => {
                log::trace!("CSV row {} unreadable: {e}", rows.len());
                rows.push(vec![None; roles.y.len() + 1]);
            }
        }
    }
    Ok(rows)
}

/// Whitespace-separated body as written by optical spectrum analyzers.
fn read_whitespace_rows<R: BufRead>(reader: R, roles: &ColumnRoles) -> Result<Vec<RawRow>> {
    let mut rows = Vec::new();
    for (row_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("text row {row_no}"))?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        rows.push(pick_columns(|i| fields.get(i).copied(), roles));
    }
    Ok(rows)
}

fn pick_columns<'a>(field: impl Fn(usize) -> Option<&'a str>, roles: &ColumnRoles) -> RawRow {
    std::iter::once(roles.x)
        .chain(roles.y.iter().map(|r| r.column))
        .map(|col| field(col).and_then(parse_number))
        .collect()
}

/// Numeric coercion. Anything that is not a finite float counts as missing.
fn parse_number(s: &str) -> Option<f64> {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

fn rows_to_trace(rows: Vec<Vec<f64>>, roles: &ColumnRoles) -> Trace {
    let x = rows.iter().map(|r| r[0]).collect();
    let channels = roles
        .y
        .iter()
        .enumerate()
        .map(|(k, role)| Channel {
            label: role.label.clone(),
            values: rows.iter().map(|r| r[k + 1]).collect(),
        })
        .collect();
    Trace { x, channels }
}
