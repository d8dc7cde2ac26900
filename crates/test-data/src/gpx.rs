//! GPX import and export of run traces.
//!
//! Reads real recordings into [`Position`] paths for feeding the simulated position
//! feed, and writes finished runs out as GPX 1.1 for viewing in other tools.

use std::{io::Read, path::Path};

use geo::Point;
use gpx::{Gpx, GpxVersion, Metadata, Track, TrackSegment, Waypoint};
use runs::models::{Position, Run};
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Error)]
pub enum GpxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("GPX parse error: {0}")]
    Parse(#[from] gpx::errors::GpxError),
    #[error("No track points found in GPX file")]
    NoPoints,
    #[error("Track point {0} has no time")]
    MissingTime(usize),
}

/// Reads every track point (all tracks, all segments) as a path.
///
/// Points must carry a `<time>`; a run trace without timestamps has no pace.
pub fn read_path(reader: impl Read) -> Result<Vec<Position>, GpxError> {
    let gpx: Gpx = gpx::read(reader)?;

    let mut path = Vec::new();
    for waypoint in gpx
        .tracks
        .iter()
        .flat_map(|t| &t.segments)
        .flat_map(|s| &s.points)
    {
        let time = waypoint.time.ok_or(GpxError::MissingTime(path.len()))?;
        let time = OffsetDateTime::from(time);
        let point = waypoint.point();
        path.push(Position::new(
            point.y(),
            point.x(),
            (time.unix_timestamp_nanos() / 1_000_000) as i64,
        ));
    }

    if path.is_empty() {
        return Err(GpxError::NoPoints);
    }
    Ok(path)
}

/// Reads a GPX file from disk, see [`read_path`].
pub fn read_path_file(path: impl AsRef<Path>) -> Result<Vec<Position>, GpxError> {
    let file = std::fs::File::open(path)?;
    read_path(std::io::BufReader::new(file))
}

/// Serializes a run's path as a single-track GPX 1.1 document.
pub fn write_run(run: &Run, name: &str) -> Result<Vec<u8>, GpxError> {
    let points = run
        .path
        .iter()
        .map(|p| {
            let mut waypoint = Waypoint::new(Point::new(p.longitude, p.latitude));
            waypoint.time = timestamp(p.timestamp_ms).map(gpx::Time::from);
            waypoint
        })
        .collect();

    let mut track = Track::new();
    track.name = Some(name.to_string());
    track.segments = vec![TrackSegment { points }];

    let gpx = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some("runs-test-data".to_string()),
        metadata: Some(Metadata {
            name: Some(name.to_string()),
            time: timestamp(run.start_time_ms).map(gpx::Time::from),
            ..Default::default()
        }),
        tracks: vec![track],
        ..Default::default()
    };

    let mut out = Vec::new();
    gpx::write(&gpx, &mut out)?;
    Ok(out)
}

pub fn write_run_file(run: &Run, name: &str, path: impl AsRef<Path>) -> Result<(), GpxError> {
    std::fs::write(path, write_run(run, name)?)?;
    Ok(())
}

fn timestamp(ms: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000).ok()
}
