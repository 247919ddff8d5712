//! CSV ingest of denaturation melts.
//!
//! This module turns a long-format melt CSV into an ordered [`MeltSet`].
//!
//! Expected columns (in this order when there is no header):
//!
//! `denat, signal, construct, dataset`
//!
//! Design goals:
//! - **Header optional**: a first row whose first field is not numeric is a header
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Deterministic behavior**: melts keep first-seen order
//! - **Separation of concerns**: no fitting logic here

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::domain::{Construct, Melt, MeltSet};
use crate::error::{IsingError, Result};

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: melts + row errors + counters.
#[derive(Debug, Clone)]
pub struct IngestedMelts {
    pub melts: MeltSet,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

#[derive(Debug, Clone, Copy)]
struct Columns {
    denat: usize,
    signal: usize,
    construct: usize,
    dataset: usize,
}

impl Columns {
    const POSITIONAL: Columns = Columns {
        denat: 0,
        signal: 1,
        construct: 2,
        dataset: 3,
    };

    fn from_header(headers: &StringRecord) -> Result<Self> {
        let map: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (normalize_header_name(name), idx))
            .collect();
        let find = |aliases: &[&str]| -> Result<usize> {
            aliases
                .iter()
                .find_map(|a| map.get(*a).copied())
                .ok_or_else(|| IsingError::Validation(format!("Missing required column: `{}`", aliases[0])))
        };
        Ok(Self {
            denat: find(&["denat", "denaturant", "denaturant concentration"])?,
            signal: find(&["signal", "cd signal", "cd"])?,
            construct: find(&["construct", "construct_melt", "repeat sequence"])?,
            dataset: find(&["dataset", "dataset number", "melt"])?,
        })
    }
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

/// Min–max normalize a signal so the highest reading maps to 0 and the
/// lowest to 1 (folded CD is the more negative end).
///
/// `None` for a flat signal.
pub fn normalize_signal(signal: &[f64]) -> Option<Vec<f64>> {
    let max = signal.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = signal.iter().copied().fold(f64::INFINITY, f64::min);
    if !(max.is_finite() && min.is_finite()) || max == min {
        return None;
    }
    Some(signal.iter().map(|&y| (y - max) / (min - max)).collect())
}

/// Load melts from a CSV file.
pub fn load_melts(path: &Path, normalize: bool) -> Result<IngestedMelts> {
    let file = File::open(path).map_err(|e| IsingError::io(path, e))?;
    let ingested = read_melts(file, normalize)?;
    if !ingested.row_errors.is_empty() {
        tracing::warn!(
            path = %path.display(),
            skipped = ingested.row_errors.len(),
            "skipped invalid melt rows"
        );
    }
    Ok(ingested)
}

/// Read melts from any CSV source.
pub fn read_melts<R: Read>(source: R, normalize: bool) -> Result<IngestedMelts> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let mut columns: Option<Columns> = None;
    let mut groups: Vec<(String, Vec<f64>, Vec<f64>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 1;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                rows_read += 1;
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        let cols = match columns {
            Some(c) => c,
            None => {
                let first = record.get(0).unwrap_or("");
                if normalize_header_name(first).parse::<f64>().is_err() {
                    columns = Some(Columns::from_header(&record)?);
                    continue;
                }
                columns = Some(Columns::POSITIONAL);
                Columns::POSITIONAL
            }
        };

        rows_read += 1;
        match parse_row(&record, cols) {
            Ok((name, d, y)) => {
                let slot = *index.entry(name.clone()).or_insert_with(|| {
                    groups.push((name, Vec::new(), Vec::new()));
                    groups.len() - 1
                });
                groups[slot].1.push(d);
                groups[slot].2.push(y);
            }
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    let mut melts = MeltSet::new();
    let mut rows_used = 0usize;
    for (name, denat, signal) in groups {
        let signal = if normalize {
            normalize_signal(&signal).ok_or_else(|| {
                IsingError::Validation(format!("melt '{name}' has a flat signal and cannot be normalized"))
            })?
        } else {
            signal
        };
        rows_used += denat.len();
        melts.insert(Melt::new(name, denat, signal)?)?;
    }

    if melts.is_empty() {
        return Err(IsingError::Validation("No valid melt rows found.".to_string()));
    }

    Ok(IngestedMelts {
        melts,
        row_errors,
        rows_read,
        rows_used,
    })
}

fn parse_row(record: &StringRecord, cols: Columns) -> std::result::Result<(String, f64, f64), String> {
    let field = |i: usize, what: &str| -> std::result::Result<&str, String> {
        match record.get(i) {
            Some(s) if !s.is_empty() => Ok(s),
            _ => Err(format!("Missing `{what}` value.")),
        }
    };
    let number = |i: usize, what: &str| -> std::result::Result<f64, String> {
        let raw = field(i, what)?;
        let v: f64 = raw.parse().map_err(|_| format!("Invalid `{what}` value '{raw}'."))?;
        if v.is_finite() {
            Ok(v)
        } else {
            Err(format!("Non-finite `{what}` value."))
        }
    };

    let denat = number(cols.denat, "denat")?;
    let signal = number(cols.signal, "signal")?;
    let construct = field(cols.construct, "construct")?;
    Construct::parse(construct).map_err(|e| e.to_string())?;
    let dataset = field(cols.dataset, "dataset")?;
    if dataset.contains('_') {
        return Err(format!("Dataset '{dataset}' must not contain '_'."));
    }

    Ok((format!("{construct}_{dataset}"), denat, signal))
}
