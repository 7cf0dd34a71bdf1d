// CSV recorder - one row per tick for the series selected at start
use crate::domain::sensor::SensorKey;
use crate::domain::series::SeriesBuffer;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

/// Raw output a session writes CSV into.
pub type RecordingSink = Box<dyn Write + Send>;

#[derive(Debug, thiserror::Error)]
pub enum RecordingError {
    #[error("a recording is already in progress")]
    AlreadyActive,
    #[error("no series selected for recording")]
    NoSeriesSelected,
    #[error("unable to start recording: {0}")]
    Open(#[source] csv::Error),
    #[error("recording was stopped because of error: {0}")]
    Write(#[source] csv::Error),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecordingStatus {
    pub active: bool,
    pub path: Option<PathBuf>,
    pub series: Vec<SensorKey>,
    pub rows: u64,
    pub started_at: Option<DateTime<Utc>>,
}

struct Session {
    writer: csv::Writer<RecordingSink>,
    path: Option<PathBuf>,
    series: Vec<SensorKey>,
    started_at: DateTime<Utc>,
    rows: u64,
}

#[derive(Default)]
pub struct Recorder {
    session: Option<Session>,
}

pub fn header_record(series: &[SensorKey]) -> Vec<&'static str> {
    std::iter::once("Time").chain(series.iter().map(SensorKey::as_str)).collect()
}

fn csv_writer(sink: RecordingSink) -> csv::Writer<RecordingSink> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(sink)
}

fn write_flushed<I, F>(writer: &mut csv::Writer<RecordingSink>, record: I) -> Result<(), csv::Error>
where
    I: IntoIterator<Item = F>,
    F: AsRef<[u8]>,
{
    writer.write_record(record)?;
    writer.flush()?;
    Ok(())
}

/// Elapsed seconds with `.` as decimal separator regardless of locale.
pub fn format_elapsed(started_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let micros = (now - started_at).num_microseconds().unwrap_or(i64::MAX);
    (micros as f64 / 1_000_000.0).to_string()
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn start<F>(
        &mut self,
        series: Vec<SensorKey>,
        path: Option<PathBuf>,
        open: F,
        now: DateTime<Utc>,
    ) -> Result<(), RecordingError>
    where
        F: FnOnce() -> std::io::Result<RecordingSink>,
    {
        if self.session.is_some() {
            return Err(RecordingError::AlreadyActive);
        }
        if series.is_empty() {
            return Err(RecordingError::NoSeriesSelected);
        }

        let sink = open().map_err(|err| RecordingError::Open(err.into()))?;
        let mut writer = csv_writer(sink);
        write_flushed(&mut writer, header_record(&series)).map_err(RecordingError::Open)?;

        tracing::info!(path = ?path, columns = series.len(), "recording started");
        self.session = Some(Session {
            writer,
            path,
            series,
            started_at: now,
            rows: 0,
        });
        Ok(())
    }

    /// Writes one row. Returns `Ok(false)` while idle. A failed write ends the session.
    pub fn on_tick(&mut self, now: DateTime<Utc>, buffer: &SeriesBuffer) -> Result<bool, RecordingError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(false);
        };

        // suppressed readings become empty fields
        let mut record = Vec::with_capacity(session.series.len() + 1);
        record.push(format_elapsed(session.started_at, now));
        record.extend(
            session
                .series
                .iter()
                .map(|key| buffer.latest(*key).map(|value| value.to_string()).unwrap_or_default()),
        );

        match write_flushed(&mut session.writer, &record) {
            Ok(()) => {
                session.rows += 1;
                Ok(true)
            }
            Err(err) => {
                let rows = session.rows;
                self.session = None;
                tracing::error!(%err, rows, "recording aborted");
                Err(RecordingError::Write(err))
            }
        }
    }

    /// Idempotent; returns the final status of the session that was closed, if any.
    pub fn stop(&mut self) -> Option<RecordingStatus> {
        let mut session = self.session.take()?;
        if let Err(err) = session.writer.flush() {
            tracing::warn!(%err, "failed to flush recording on stop");
        }
        tracing::info!(path = ?session.path, rows = session.rows, "recording stopped");
        Some(RecordingStatus {
            active: false,
            path: session.path,
            series: session.series,
            rows: session.rows,
            started_at: Some(session.started_at),
        })
    }

    pub fn status(&self) -> RecordingStatus {
        match &self.session {
            Some(session) => RecordingStatus {
                active: true,
                path: session.path.clone(),
                series: session.series.clone(),
                rows: session.rows,
                started_at: Some(session.started_at),
            },
            None => RecordingStatus {
                active: false,
                path: None,
                series: Vec::new(),
                rows: 0,
                started_at: None,
            },
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{FailingSink, SharedBuffer};
    use super::*;
    use chrono::TimeDelta;

    fn t0() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + TimeDelta::days(20_000)
    }

    fn buffer_with(values: &[(SensorKey, f64)], at: DateTime<Utc>) -> SeriesBuffer {
        let mut buffer = SeriesBuffer::new();
        for (key, value) in values {
            buffer.append(*key, at, *value);
        }
        buffer
    }

    #[test]
    fn test_header_and_rows() {
        let out = SharedBuffer::default();
        let mut recorder = Recorder::new();
        recorder
            .start(vec![SensorKey::Power, SensorKey::Temperature], None, || out.sink(), t0())
            .unwrap();

        let now = t0() + TimeDelta::milliseconds(1500);
        let buffer = buffer_with(&[(SensorKey::Power, 42.1234), (SensorKey::Temperature, 0.0)], now);
        assert!(recorder.on_tick(now, &buffer).unwrap());

        assert_eq!(out.lines(), vec!["Time,Power,Temperature", "1.5,42.123,"]);
        assert_eq!(recorder.status().rows, 1);
    }

    #[test]
    fn test_second_start_leaves_session_untouched() {
        let first = SharedBuffer::default();
        let second = SharedBuffer::default();
        let mut recorder = Recorder::new();
        recorder.start(vec![SensorKey::Power], None, || first.sink(), t0()).unwrap();

        let err = recorder
            .start(vec![SensorKey::Resistance], None, || second.sink(), t0())
            .unwrap_err();
        assert!(matches!(err, RecordingError::AlreadyActive));
        assert!(second.lines().is_empty());

        let buffer = buffer_with(&[(SensorKey::Power, 10.0)], t0());
        recorder.on_tick(t0() + TimeDelta::seconds(1), &buffer).unwrap();
        assert_eq!(first.lines(), vec!["Time,Power", "1,10"]);
        assert_eq!(recorder.status().series, vec![SensorKey::Power]);
    }

    #[test]
    fn test_open_failure_stays_idle() {
        let mut recorder = Recorder::new();
        let err = recorder
            .start(
                vec![SensorKey::Power],
                None,
                || Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied")),
                t0(),
            )
            .unwrap_err();
        assert!(matches!(err, RecordingError::Open(_)));
        assert!(!recorder.is_active());
    }

    #[test]
    fn test_empty_selection_is_rejected() {
        let out = SharedBuffer::default();
        let mut recorder = Recorder::new();
        let err = recorder.start(Vec::new(), None, || out.sink(), t0()).unwrap_err();
        assert!(matches!(err, RecordingError::NoSeriesSelected));
        assert!(out.lines().is_empty());
    }

    #[test]
    fn test_write_failure_aborts_session() {
        let inner = SharedBuffer::default();
        let sink_inner = inner.clone();
        let mut recorder = Recorder::new();
        recorder
            .start(
                vec![SensorKey::Power],
                None,
                move || {
                    Ok(Box::new(FailingSink {
                        inner: sink_inner,
                        budget: 2,
                    }) as RecordingSink)
                },
                t0(),
            )
            .unwrap();

        let buffer = buffer_with(&[(SensorKey::Power, 5.0)], t0());
        assert!(recorder.on_tick(t0() + TimeDelta::seconds(1), &buffer).unwrap());
        let err = recorder.on_tick(t0() + TimeDelta::seconds(2), &buffer).unwrap_err();
        assert!(matches!(err, RecordingError::Write(_)));
        assert!(!recorder.is_active());

        assert!(!recorder.on_tick(t0() + TimeDelta::seconds(3), &buffer).unwrap());
        assert_eq!(inner.lines(), vec!["Time,Power", "1,5"]);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let out = SharedBuffer::default();
        let mut recorder = Recorder::new();
        recorder.start(vec![SensorKey::Power], None, || out.sink(), t0()).unwrap();

        let summary = recorder.stop().unwrap();
        assert!(!summary.active);
        assert!(recorder.stop().is_none());
        assert!(!recorder.status().active);
    }

    #[test]
    fn test_elapsed_formatting() {
        assert_eq!(format_elapsed(t0(), t0()), "0");
        assert_eq!(format_elapsed(t0(), t0() + TimeDelta::milliseconds(100)), "0.1");
        assert_eq!(format_elapsed(t0(), t0() + TimeDelta::milliseconds(12_250)), "12.25");
    }
}
