//! Export fit results and melt tables.
//!
//! The exports are meant to be easy to consume in spreadsheets or downstream
//! scripts:
//! - the fit report as pretty JSON
//! - one CSV row per observation (observed, fitted, residual)
//! - melts in the same long format `io::ingest` reads

use std::fs::File;
use std::path::Path;

use serde::Serialize;

use crate::domain::{FitReport, MeltSet, Parameters};
use crate::error::{IsingError, Result};
use crate::fit::IsingModel;

/// Write the fit report as JSON.
pub fn write_report_json(path: &Path, report: &FitReport) -> Result<()> {
    let file = File::create(path).map_err(|e| IsingError::io(path, e))?;
    serde_json::to_writer_pretty(file, report).map_err(|e| IsingError::io(path, e))
}

#[derive(Debug, Serialize)]
struct PointRow<'a> {
    melt: &'a str,
    construct: &'a str,
    denat: f64,
    signal: f64,
    fitted: f64,
    frac_folded: f64,
    residual: f64,
}

/// Write one row per observation under `params`.
pub fn write_points_csv(path: &Path, model: &IsingModel, melts: &MeltSet, params: &Parameters) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| IsingError::io(path, e))?;
    for melt in melts.iter() {
        let pred = model.predict(melt, params)?;
        for i in 0..melt.len() {
            writer
                .serialize(PointRow {
                    melt: &melt.name,
                    construct: &melt.construct,
                    denat: melt.denat[i],
                    signal: melt.signal[i],
                    fitted: pred.signal[i],
                    frac_folded: pred.frac_folded[i],
                    residual: melt.signal[i] - pred.signal[i],
                })
                .map_err(|e| IsingError::io(path, e))?;
        }
    }
    writer.flush().map_err(|e| IsingError::io(path, e))
}

#[derive(Debug, Serialize)]
struct MeltRow<'a> {
    denat: f64,
    signal: f64,
    construct: &'a str,
    dataset: &'a str,
}

/// Write melts as `denat,signal,construct,dataset` rows.
pub fn write_melts_csv(path: &Path, melts: &MeltSet) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| IsingError::io(path, e))?;
    for melt in melts.iter() {
        let dataset = melt.name.rsplit_once('_').map(|(_, d)| d).unwrap_or("");
        for (&denat, &signal) in melt.denat.iter().zip(&melt.signal) {
            writer
                .serialize(MeltRow {
                    denat,
                    signal,
                    construct: &melt.construct,
                    dataset,
                })
                .map_err(|e| IsingError::io(path, e))?;
        }
    }
    writer.flush().map_err(|e| IsingError::io(path, e))
}
