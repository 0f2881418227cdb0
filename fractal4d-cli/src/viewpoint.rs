//! Camera track persistence.
//!
//! A track is a sequence of camera snapshots, one CSV row each: the 14
//! scalar fields of the camera (4 position, 4 left rotor, 4 right rotor,
//! 2 scale) followed by the interpolation step factor used when animating
//! toward that snapshot. No header row.

use anyhow::{bail, Context, Result};
use fractal4d_core::Plane4;
use std::io::{Read, Write};

pub struct Snapshot {
    pub camera: Plane4,
    /// Interpolation increment per frame for the transition ending here.
    pub factor: f64,
}

pub fn read_track<R: Read>(reader: R) -> Result<Vec<Snapshot>> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(reader);

    let mut track = Vec::new();
    for (row, record) in csv.records().enumerate() {
        let record = record.with_context(|| format!("viewpoint row {}", row + 1))?;
        if record.len() != 15 {
            bail!(
                "viewpoint row {} has {} fields, expected 15",
                row + 1,
                record.len()
            );
        }
        let mut values = [0.0f64; 15];
        for (i, field) in record.iter().enumerate() {
            values[i] = field
                .trim()
                .parse()
                .with_context(|| format!("viewpoint row {} field {}", row + 1, i + 1))?;
        }
        let mut fields = [0.0f64; 14];
        fields.copy_from_slice(&values[..14]);
        track.push(Snapshot {
            camera: Plane4::from_fields(fields),
            factor: values[14],
        });
    }
    Ok(track)
}

pub fn write_track<W: Write>(writer: W, track: &[Snapshot]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for snapshot in track {
        let mut row: Vec<String> = snapshot
            .camera
            .to_fields()
            .iter()
            .map(f64::to_string)
            .collect();
        row.push(snapshot.factor.to_string());
        csv.write_record(&row).context("writing viewpoint row")?;
    }
    csv.flush().context("flushing viewpoint track")?;
    Ok(())
}
