//! Per-epoch CSV telemetry.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::trainer::EpochSummary;

pub const CSV_HEADER: &str = "epoch,seconds,loss,reconstruction,commitment,perplexity,unused_codes";

/// Write a full training run to CSV.
pub fn write_csv(path: &Path, records: &[EpochSummary]) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    write_records(&mut w, records)?;
    w.flush()
}

pub fn write_records<W: Write>(w: &mut W, records: &[EpochSummary]) -> std::io::Result<()> {
    writeln!(w, "{CSV_HEADER}")?;
    for r in records {
        writeln!(
            w,
            "{},{:.4},{:.6},{:.6},{:.6},{:.4},{}",
            r.epoch, r.seconds, r.loss, r.reconstruction, r.commitment, r.perplexity, r.unused_codes,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_layout() {
        let rec = EpochSummary {
            epoch: 3,
            seconds: 0.5,
            loss: 1.25,
            reconstruction: 1.0,
            commitment: 1.0,
            perplexity: 2.0,
            unused_codes: 7,
        };
        let mut buf = Vec::new();
        write_records(&mut buf, &[rec]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));
        assert_eq!(lines.next(), Some("3,0.5000,1.250000,1.000000,1.000000,2.0000,7"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.csv");
        write_csv(&path, &[]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim_end(), CSV_HEADER);
    }
}
