use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// What one painted frame saw: byte spectra and byte waveforms per branch.
#[derive(Serialize)]
pub struct SnapshotRecord<'a> {
    pub frame: u64,
    pub time: f64,
    pub high: &'a [u8],
    pub low: &'a [u8],
    pub high_waveform: &'a [u8],
    pub low_waveform: &'a [u8],
}

/// One JSON object per painted frame.
pub struct SnapshotDump {
    writer: BufWriter<File>,
    records: u64,
}

impl SnapshotDump {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create snapshot dump: {}", path.display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
            records: 0,
        })
    }

    pub fn write(&mut self, record: &SnapshotRecord<'_>) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.records += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<u64> {
        self.writer.flush().context("Failed to flush snapshot dump")?;
        Ok(self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_one_line_per_frame() {
        let path = std::env::temp_dir().join(format!("dualband-snapshots-{}.jsonl", std::process::id()));
        let mut dump = SnapshotDump::create(&path).unwrap();
        dump.write(&SnapshotRecord {
            frame: 0,
            time: 0.0,
            high: &[0, 10, 255],
            low: &[1, 2, 3],
            high_waveform: &[128, 255, 0, 128],
            low_waveform: &[128; 4],
        })
        .unwrap();
        dump.write(&SnapshotRecord {
            frame: 1,
            time: 1.0 / 60.0,
            high: &[5, 5, 5],
            low: &[0, 0, 0],
            high_waveform: &[128; 4],
            low_waveform: &[128; 4],
        })
        .unwrap();
        assert_eq!(dump.finish().unwrap(), 2);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["frame"], 0);
        assert_eq!(first["high"], serde_json::json!([0, 10, 255]));
        assert_eq!(first["low"], serde_json::json!([1, 2, 3]));
        assert_eq!(first["high_waveform"], serde_json::json!([128, 255, 0, 128]));

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["frame"], 1);
        std::fs::remove_file(&path).ok();
    }
}
