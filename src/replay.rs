//! Deterministic replay of recorded per-frame signals.
//!
//! A trace is JSON lines, one object per frame:
//!
//! ```text
//! {"t": 0.033, "width": 640, "height": 480, "face_count": 1, "landmarks": [[0.41, 0.52], ...]}
//! ```
//!
//! `t` is seconds since the start of the recording. `landmarks` may be `null`
//! when the face mesh found nothing; points may carry an optional `z`.

use crate::{
    landmarks::{Landmark, LandmarkSet},
    session::{FrameReport, ProctorSession},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::time::{Duration, Instant};

/// One recorded frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Seconds since the start of the recording
    pub t: f64,
    pub width: u32,
    pub height: u32,
    pub face_count: usize,
    #[serde(default)]
    pub landmarks: Option<Vec<Vec<f64>>>,
}

impl TraceRecord {
    /// Offset of this frame from the start of the recording
    ///
    /// # Errors
    ///
    /// Returns `Error::TraceError` for a negative or non-finite timestamp.
    pub fn offset(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.t)
            .map_err(|_| Error::TraceError(format!("Invalid timestamp {}", self.t)))
    }

    /// Decode the recorded landmarks, if any
    ///
    /// # Errors
    ///
    /// Returns `Error::TraceError` if a point does not have two or three
    /// coordinates, and `Error::InvalidInput` if the set is too small.
    pub fn landmark_set(&self) -> Result<Option<LandmarkSet>> {
        let Some(raw) = &self.landmarks else {
            return Ok(None);
        };

        let points = raw
            .iter()
            .enumerate()
            .map(|(i, coords)| match coords.as_slice() {
                [x, y] => Ok(Landmark::new(*x, *y)),
                [x, y, z] => Ok(Landmark { x: *x, y: *y, z: *z }),
                _ => Err(Error::TraceError(format!(
                    "Landmark {i} has {} coordinates, expected 2 or 3",
                    coords.len()
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        LandmarkSet::new(points).map(Some)
    }
}

/// Read a JSON-lines trace. Blank lines are skipped.
///
/// # Errors
///
/// Returns `Error::Io` on read failure and `Error::TraceError` naming the
/// 1-based line number of the first malformed record.
pub fn read_trace<R: BufRead>(reader: R) -> Result<Vec<TraceRecord>> {
    let mut records = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let record: TraceRecord = serde_json::from_str(&line)
            .map_err(|e| Error::TraceError(format!("line {}: {e}", idx + 1)))?;
        records.push(record);
    }

    log::debug!("Read {} trace records", records.len());
    Ok(records)
}

/// Feed recorded frames through a session, timing each frame as `base` plus
/// the record's offset so that replays are reproducible.
///
/// # Errors
///
/// Returns `Error::TraceError` naming the record index if a record cannot be
/// decoded or its timestamp does not fit on the clock.
pub fn replay_trace(session: &mut ProctorSession, records: &[TraceRecord], base: Instant) -> Result<Vec<FrameReport>> {
    records
        .iter()
        .enumerate()
        .map(|(idx, record)| {
            let decode = || -> Result<(Instant, Option<LandmarkSet>)> {
                let offset = record.offset()?;
                let now = base
                    .checked_add(offset)
                    .ok_or_else(|| Error::TraceError(format!("Timestamp {} is out of range", record.t)))?;
                Ok((now, record.landmark_set()?))
            };
            let (now, landmarks) = decode().map_err(|e| Error::TraceError(format!("record {idx}: {e}")))?;

            Ok(session.process_frame(
                landmarks.as_ref(),
                record.face_count,
                record.width,
                record.height,
                now,
            ))
        })
        .collect()
}

/// Write reports as JSON lines
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn write_reports<W: Write>(reports: &[FrameReport], mut writer: W) -> Result<()> {
    for report in reports {
        serde_json::to_writer(&mut writer, report)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
