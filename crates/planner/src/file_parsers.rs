//! Activity file parsers for FIT, TCX, GPX and native JSON records.
//!
//! Every format is converted into [`ActivityData`]: a records table with
//! standardized column names, resampled to 1 Hz, plus whatever summaries the
//! format carries.

use std::{collections::BTreeMap, io::BufReader, path::Path};

use bytes::{Buf as _, Bytes};
use geo::{Distance as _, Haversine, Point};
use time::OffsetDateTime;
use tracing::debug;

use crate::records::{
    ActivityData, ActivityTotals, Records, SportSummary, Summaries, UnknownMessage,
};

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    Fit,
    Tcx,
    Gpx,
    /// Serialized [`ActivityData`].
    Records,
    Other,
}

impl FileType {
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if name.ends_with(".records.json") {
            return FileType::Records;
        }
        match path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .as_deref()
        {
            Some("fit") => FileType::Fit,
            Some("tcx") => FileType::Tcx,
            Some("gpx") => FileType::Gpx,
            _ => FileType::Other,
        }
    }

    /// Detects the format from magic bytes or the root XML element.
    pub fn detect_from_bytes(bytes: &[u8]) -> Self {
        if bytes.len() >= 12 && &bytes[8..12] == b".FIT" {
            return FileType::Fit;
        }
        let head = String::from_utf8_lossy(&bytes[..bytes.len().min(512)]);
        if head.contains("<TrainingCenterDatabase") {
            FileType::Tcx
        } else if head.contains("<gpx") {
            FileType::Gpx
        } else if head.trim_start().starts_with('{') && head.contains("\"records\"") {
            FileType::Records
        } else {
            FileType::Other
        }
    }
}

/// Error type for parsing failures
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Failed to read activity file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse GPX file: {0}")]
    GpxError(String),
    #[error("Failed to parse TCX file: {0}")]
    TcxError(String),
    #[error("Failed to parse FIT file: {0}")]
    FitError(String),
    #[error("Failed to parse records file: {0}")]
    RecordsError(#[from] serde_json::Error),
    #[error("Malformed records: {0}")]
    MalformedRecords(String),
    #[error("Unsupported file type: {0:?}")]
    UnsupportedFileType(FileType),
}

/// Reads and parses an activity file, standardizing and resampling it.
pub fn read_file(path: &Path) -> Result<ActivityData, ParseError> {
    let bytes = Bytes::from(std::fs::read(path)?);
    debug!("Parsing {}", path.display());
    parse_activity_file(FileType::from_path(path), bytes)
}

/// Parse an activity file based on its detected type.
/// For FileType::Other, attempts to detect the format from the bytes.
pub fn parse_activity_file(file_type: FileType, bytes: Bytes) -> Result<ActivityData, ParseError> {
    let actual_type = if file_type == FileType::Other {
        FileType::detect_from_bytes(&bytes)
    } else {
        file_type
    };

    let mut data = match actual_type {
        FileType::Gpx => parse_gpx(bytes)?,
        FileType::Tcx => parse_tcx(bytes)?,
        FileType::Fit => parse_fit(bytes)?,
        FileType::Records => {
            let data: ActivityData = serde_json::from_slice(&bytes)?;
            data.records
                .check_lengths()
                .map_err(ParseError::MalformedRecords)?;
            return Ok(data);
        }
        FileType::Other => return Err(ParseError::UnsupportedFileType(actual_type)),
    };

    data.records.standardize(true);
    data.records = data.records.resample_1hz();
    Ok(data)
}

/// Collects samples row by row and turns them into columns.
#[derive(Default)]
struct RecordsBuilder {
    times: Vec<OffsetDateTime>,
    numeric: BTreeMap<String, Vec<Option<f64>>>,
    text: BTreeMap<String, Vec<Option<String>>>,
}

impl RecordsBuilder {
    fn push(&mut self, time: OffsetDateTime, numeric: Vec<(String, f64)>, text: Vec<(String, String)>) {
        let row = self.times.len();
        self.times.push(time);
        for (name, value) in numeric {
            let column = self.numeric.entry(name).or_default();
            column.resize(row, None);
            column.push(Some(value));
        }
        for (name, value) in text {
            let column = self.text.entry(name).or_default();
            column.resize(row, None);
            column.push(Some(value));
        }
    }

    fn finish(self) -> Records {
        let len = self.times.len();
        let Some(&start) = self.times.first() else {
            return Records::default();
        };
        let elapsed = self
            .times
            .iter()
            .map(|t| (*t - start).as_seconds_f64())
            .collect();
        let mut records = Records::new(Some(start), elapsed);
        for (name, mut values) in self.numeric {
            values.resize(len, None);
            records.insert_numeric(name, values);
        }
        for (name, mut values) in self.text {
            values.resize(len, None);
            records.insert_text(name, values);
        }
        records
    }
}

/// Parse a GPX file. Distance is accumulated from positions.
pub fn parse_gpx(bytes: Bytes) -> Result<ActivityData, ParseError> {
    let gpx = gpx::read(bytes.reader()).map_err(|e| ParseError::GpxError(e.to_string()))?;

    let mut builder = RecordsBuilder::default();
    let mut distance = 0.0;
    let mut last: Option<Point> = None;

    for track in &gpx.tracks {
        for seg in &track.segments {
            for pt in &seg.points {
                let timestamp = pt.time.as_ref().and_then(|t| {
                    t.format().ok().and_then(|s| {
                        OffsetDateTime::parse(&s, &time::format_description::well_known::Rfc3339)
                            .ok()
                    })
                });
                let Some(timestamp) = timestamp else {
                    continue;
                };
                let point = pt.point();
                distance += last.map_or(0.0, |prev| Haversine.distance(prev, point));
                last = Some(point);

                let mut numeric = vec![
                    ("latitude".to_string(), point.y()),
                    ("longitude".to_string(), point.x()),
                    ("distance".to_string(), distance),
                ];
                if let Some(elevation) = pt.elevation {
                    numeric.push(("altitude".to_string(), elevation));
                }
                builder.push(timestamp, numeric, Vec::new());
            }
        }
    }

    Ok(ActivityData::new(builder.finish()))
}

/// Parse a TCX (Training Center XML) file.
pub fn parse_tcx(bytes: Bytes) -> Result<ActivityData, ParseError> {
    // TCX crate needs a BufReader
    let cursor = std::io::Cursor::new(bytes.to_vec());
    let mut buf_reader = BufReader::new(cursor);

    let tcx_data =
        tcx::read(&mut buf_reader).map_err(|e| ParseError::TcxError(format!("{e:?}")))?;

    let mut builder = RecordsBuilder::default();
    let mut summaries = Summaries::default();

    if let Some(ref activities) = tcx_data.activities {
        for activity in &activities.activities {
            summaries.sports.push(SportSummary {
                sport: activity.sport.to_lowercase(),
                sub_sport: None,
                name: None,
            });
            for lap in &activity.laps {
                let mut lap_summary = BTreeMap::new();
                lap_summary.insert("total_timer_time".to_string(), lap.total_time_seconds as f64);
                lap_summary.insert("total_distance".to_string(), lap.distance_meters as f64);
                summaries.laps.push(lap_summary);

                for track in &lap.tracks {
                    for trackpoint in &track.trackpoints {
                        let time = chrono_to_offset_datetime_utc(&trackpoint.time);
                        let mut numeric = Vec::new();
                        if let Some(ref position) = trackpoint.position {
                            numeric.push(("latitude".to_string(), position.latitude));
                            numeric.push(("longitude".to_string(), position.longitude));
                        }
                        if let Some(altitude) = trackpoint.altitude_meters {
                            numeric.push(("altitude".to_string(), altitude));
                        }
                        if let Some(distance) = trackpoint.distance_meters {
                            numeric.push(("distance".to_string(), distance));
                        }
                        if let Some(ref hr) = trackpoint.heart_rate {
                            numeric.push(("heartrate".to_string(), hr.value as f64));
                        }
                        if let Some(cadence) = trackpoint.cadence {
                            numeric.push(("cadence".to_string(), cadence as f64));
                        }
                        builder.push(time, numeric, Vec::new());
                    }
                }
            }
        }
    }

    let total: f64 = summaries
        .laps
        .iter()
        .filter_map(|lap| lap.get("total_timer_time"))
        .sum();
    if total > 0.0 {
        summaries.activity = Some(ActivityTotals {
            total_timer_time: Some(total),
        });
    }

    Ok(ActivityData {
        records: builder.finish(),
        summaries,
    })
}

/// Convert chrono DateTime<Utc> to time OffsetDateTime
fn chrono_to_offset_datetime_utc(dt: &chrono::DateTime<chrono::Utc>) -> OffsetDateTime {
    let ts = dt.timestamp();
    let ns = dt.timestamp_subsec_nanos();

    OffsetDateTime::from_unix_timestamp(ts)
        .map(|odt| odt.replace_nanosecond(ns).unwrap_or(odt))
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

/// Convert chrono DateTime<Local> to time OffsetDateTime
fn chrono_to_offset_datetime_local(dt: &chrono::DateTime<chrono::Local>) -> OffsetDateTime {
    use chrono::Utc;
    let utc_dt = dt.with_timezone(&Utc);
    chrono_to_offset_datetime_utc(&utc_dt)
}

/// Parse a FIT (Flexible and Interoperable Data Transfer) file.
///
/// Record messages become samples; sport, lap, session, activity and HRV
/// messages become summaries; unrecognised vendor messages are kept raw.
pub fn parse_fit(bytes: Bytes) -> Result<ActivityData, ParseError> {
    let data = bytes.to_vec();
    let fit_data = fitparser::from_bytes(&data).map_err(|e| ParseError::FitError(e.to_string()))?;
    Ok(fit_messages_to_data(fit_data))
}

/// Converts decoded FIT messages into records and summaries.
fn fit_messages_to_data(fit_data: Vec<fitparser::FitDataRecord>) -> ActivityData {
    use fitparser::profile::field_types::MesgNum;

    let mut builder = RecordsBuilder::default();
    let mut summaries = Summaries::default();
    let mut session_sports = Vec::new();

    for record in fit_data {
        match record.kind() {
            MesgNum::Record => {
                let mut timestamp: Option<OffsetDateTime> = None;
                let mut numeric = Vec::new();
                let mut text = Vec::new();
                for field in record.fields() {
                    match (field.name(), field.value()) {
                        ("timestamp", fitparser::Value::Timestamp(t)) => {
                            timestamp = Some(chrono_to_offset_datetime_local(t));
                        }
                        ("position_lat" | "position_long", fitparser::Value::SInt32(v)) => {
                            numeric.push((field.name().to_string(), semicircles_to_degrees(*v)));
                        }
                        (name, fitparser::Value::String(s)) => {
                            text.push((name.to_string(), s.clone()));
                        }
                        (name, value) => {
                            if let Some(v) = extract_fit_f64(value) {
                                numeric.push((fit_field_name(name, field.number()), v));
                            }
                        }
                    }
                }
                if let Some(timestamp) = timestamp {
                    builder.push(timestamp, numeric, text);
                }
            }
            MesgNum::Sport => {
                let text = text_fields(&record);
                if let Some(sport) = text.get("sport") {
                    summaries.sports.push(SportSummary {
                        sport: sport.clone(),
                        sub_sport: text.get("sub_sport").cloned(),
                        name: text.get("name").cloned(),
                    });
                }
            }
            MesgNum::Lap => summaries.laps.push(numeric_fields(&record)),
            MesgNum::Session => {
                let text = text_fields(&record);
                if let Some(sport) = text.get("sport") {
                    session_sports.push(SportSummary {
                        sport: sport.clone(),
                        sub_sport: text.get("sub_sport").cloned(),
                        name: None,
                    });
                }
                summaries.sessions.push(numeric_fields(&record));
            }
            MesgNum::Activity => {
                summaries.activity = Some(ActivityTotals {
                    total_timer_time: numeric_fields(&record).get("total_timer_time").copied(),
                });
            }
            MesgNum::Hrv => {
                for field in record.fields() {
                    if field.name() != "time" {
                        continue;
                    }
                    match field.value() {
                        fitparser::Value::Array(values) => summaries
                            .hrv
                            .extend(values.iter().filter_map(extract_fit_f64)),
                        value => summaries.hrv.extend(extract_fit_f64(value)),
                    }
                }
            }
            MesgNum::Value(number) => {
                let fields = record
                    .fields()
                    .iter()
                    .filter_map(|f| {
                        extract_fit_f64(f.value()).map(|v| (fit_field_name(f.name(), f.number()), v))
                    })
                    .collect();
                summaries
                    .unknown_messages
                    .push(UnknownMessage::from_number(number, fields));
            }
            _ => {}
        }
    }

    // Sessions carry the sport when no sport message was written.
    if summaries.sports.is_empty() {
        summaries.sports = session_sports;
    }

    ActivityData {
        records: builder.finish(),
        summaries,
    }
}

/// Undefined developer and vendor fields are named `unknown_<number>`.
fn fit_field_name(name: &str, number: u8) -> String {
    if name.starts_with("unknown") {
        format!("unknown_{number}")
    } else {
        name.to_string()
    }
}

fn numeric_fields(record: &fitparser::FitDataRecord) -> BTreeMap<String, f64> {
    record
        .fields()
        .iter()
        .filter_map(|f| extract_fit_f64(f.value()).map(|v| (fit_field_name(f.name(), f.number()), v)))
        .collect()
}

fn text_fields(record: &fitparser::FitDataRecord) -> BTreeMap<String, String> {
    record
        .fields()
        .iter()
        .filter_map(|f| match f.value() {
            fitparser::Value::String(s) => Some((f.name().to_string(), s.clone())),
            _ => None,
        })
        .collect()
}

/// Convert FIT semicircles to degrees.
/// FIT uses semicircles where 2^31 semicircles = 180 degrees.
fn semicircles_to_degrees(semicircles: i32) -> f64 {
    (semicircles as f64) * (180.0 / 2_147_483_648.0)
}

/// Extract f64 from various FIT value types
fn extract_fit_f64(value: &fitparser::Value) -> Option<f64> {
    match value {
        fitparser::Value::Float32(v) => Some(*v as f64),
        fitparser::Value::Float64(v) => Some(*v),
        fitparser::Value::SInt8(v) => Some(*v as f64),
        fitparser::Value::UInt8(v) => Some(*v as f64),
        fitparser::Value::SInt16(v) => Some(*v as f64),
        fitparser::Value::UInt16(v) => Some(*v as f64),
        fitparser::Value::SInt32(v) => Some(*v as f64),
        fitparser::Value::UInt32(v) => Some(*v as f64),
        fitparser::Value::UInt8z(v) => Some(*v as f64),
        fitparser::Value::UInt16z(v) => Some(*v as f64),
        fitparser::Value::UInt32z(v) => Some(*v as f64),
        _ => None,
    }
}
