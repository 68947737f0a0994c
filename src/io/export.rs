//! Compressed tabular export of the recorded step rows.
//!
//! The full row sequence is written once at end of run as a single CSV
//! table named `basecase` inside a deflate-compressed zip archive.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use thiserror::Error;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::record::StepRecord;

/// Table name inside the archive.
pub const TABLE_NAME: &str = "basecase";

/// Column header; complex quantities are split into `_re`/`_im` pairs.
const HEADER: &str = "t,G,T,Ud,Fc,ctl,Vrms,GVrms,Vc_re,Vc_im,Vs_re,Vs_im,\
                      Ic_re,Ic_im,Is_re,Is_im,Vdc,Idc";

/// Export failure: file creation, CSV serialization, or archive writing.
#[derive(Debug, Error)]
pub enum ExportError {
    /// File I/O failure.
    #[error("export error: {0}")]
    Io(#[from] std::io::Error),
    /// CSV serialization failure.
    #[error("export error: {0}")]
    Csv(#[from] csv::Error),
    /// Zip archive failure.
    #[error("export error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Writes the rows as CSV to any writer: header plus one row per step.
///
/// Output is deterministic for identical inputs.
///
/// # Errors
///
/// Returns an `ExportError` if writing fails.
pub fn write_csv(rows: &[StepRecord], writer: impl Write) -> Result<(), ExportError> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    for r in rows {
        wtr.write_record(&[
            format!("{:.6}", r.time),
            format!("{:.6}", r.g),
            format!("{:.6}", r.t),
            format!("{:.6}", r.ud),
            format!("{:.6}", r.fc),
            format!("{:.6}", r.ctl),
            format!("{:.6}", r.vrms),
            format!("{:.6}", r.g_vrms),
            format!("{:.6}", r.vc.re),
            format!("{:.6}", r.vc.im),
            format!("{:.6}", r.vs.re),
            format!("{:.6}", r.vs.im),
            format!("{:.6}", r.ic.re),
            format!("{:.6}", r.ic.im),
            format!("{:.6}", r.is.re),
            format!("{:.6}", r.is.im),
            format!("{:.6}", r.vdc),
            format!("{:.6}", r.idc),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Exports the rows as `basecase.csv` inside a deflate zip at `path`.
///
/// # Errors
///
/// Returns an `ExportError` if the file cannot be created or written.
pub fn export_zip(rows: &[StepRecord], path: &Path) -> Result<(), ExportError> {
    let file = File::create(path)?;
    let mut archive = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    archive.start_file(format!("{TABLE_NAME}.csv"), options)?;
    write_csv(rows, &mut archive)?;
    archive.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;

    fn make_row(t: usize) -> StepRecord {
        StepRecord {
            time: t as f64,
            g: 900.0,
            t: 25.0,
            ud: 1.0,
            fc: 60.0,
            ctl: 1.0,
            vc: Complex64::new(240.0, 0.0),
            vrms: 240.0,
            g_vrms: 216.0,
            vs: Complex64::new(240.0, 0.0),
            ic: Complex64::new(12.0, 0.0),
            is: Complex64::new(12.0, -0.9),
            vdc: 399.0,
            idc: 541.0,
        }
    }

    #[test]
    fn header_has_eighteen_columns() {
        let mut buf = Vec::new();
        write_csv(&[make_row(0)], &mut buf).ok();
        let output = String::from_utf8(buf).ok();
        let first = output.as_deref().unwrap_or("").lines().next().unwrap_or("");
        assert_eq!(first.split(',').count(), 18);
        assert!(first.starts_with("t,G,T,Ud,Fc,ctl,Vrms,GVrms"));
        assert!(first.ends_with("Vdc,Idc"));
    }

    #[test]
    fn row_count_matches_step_count() {
        let rows: Vec<StepRecord> = (0..24).map(make_row).collect();
        let mut buf = Vec::new();
        write_csv(&rows, &mut buf).ok();
        let output = String::from_utf8(buf).ok();
        // 1 header + 24 data rows
        assert_eq!(output.as_deref().unwrap_or("").lines().count(), 25);
    }

    #[test]
    fn output_is_deterministic() {
        let rows: Vec<StepRecord> = (0..5).map(make_row).collect();
        let mut buf1 = Vec::new();
        let mut buf2 = Vec::new();
        write_csv(&rows, &mut buf1).ok();
        write_csv(&rows, &mut buf2).ok();
        assert_eq!(buf1, buf2);
    }

    #[test]
    fn complex_columns_round_trip_as_floats() {
        let rows = vec![make_row(0)];
        let mut buf = Vec::new();
        write_csv(&rows, &mut buf).ok();

        let mut rdr = csv::ReaderBuilder::new().from_reader(buf.as_slice());
        for record in rdr.records() {
            let rec = record.ok();
            assert!(rec.is_some(), "every row should parse");
            for field in rec.iter().flatten() {
                let value: Result<f64, _> = field.parse();
                assert!(value.is_ok(), "field \"{field}\" should parse as f64");
            }
        }
    }

    #[test]
    fn empty_row_set_writes_header_only() {
        let mut buf = Vec::new();
        write_csv(&[], &mut buf).ok();
        let output = String::from_utf8(buf).ok();
        assert_eq!(output.as_deref().unwrap_or("").lines().count(), 1);
    }
}
