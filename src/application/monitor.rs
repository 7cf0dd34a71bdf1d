// Monitor service - sole owner of series, window, recorder and selection state.
// Ticks from the acquisition thread and user commands are applied one at a time on this task.
use crate::application::acquisition::{AcquisitionEvent, DeviceStatus};
use crate::application::recorder::{Recorder, RecordingError, RecordingSink, RecordingStatus};
use crate::application::transport::{Transport, TransportError};
use crate::domain::reading::ReadingSet;
use crate::domain::selection::Selection;
use crate::domain::sensor::{SensorKey, PLOTTED};
use crate::domain::series::SeriesBuffer;
use crate::domain::window::{
    time_frame_from_secs, WindowController, WindowError, WindowSnapshot, TIME_FRAME_PRESETS_SECS,
};
use crate::infrastructure::csv_sink;
use crate::infrastructure::selection_store::SelectionStore;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

pub const MAX_ACTION_SECS: u8 = 9;

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error(transparent)]
    Window(#[from] WindowError),
    #[error(transparent)]
    Recording(#[from] RecordingError),
    #[error("series selection cannot change while recording")]
    SelectionLocked,
    #[error("{0} has no series")]
    NotPlotted(SensorKey),
    #[error("action duration must be 1..={max} seconds, got {0}", max = MAX_ACTION_SECS)]
    InvalidActionDuration(u8),
    #[error("previous action still running until {0}")]
    ActionBusy(DateTime<Utc>),
    #[error("recording path {0} must be relative to the recordings directory")]
    InvalidRecordingPath(PathBuf),
    #[error("no compatible USB device is connected")]
    DeviceUnavailable,
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("monitor is not running")]
    Unavailable,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlotPoint {
    pub time: DateTime<Utc>,
    pub value: Option<f64>,
    pub label: Option<String>,
    /// Position on the shared display scale; absent for gaps.
    pub y: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeriesView {
    pub key: SensorKey,
    pub color: &'static str,
    pub last_value: String,
    pub points: Vec<PlotPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeriesSnapshot {
    pub window: WindowSnapshot,
    pub series: Vec<SeriesView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeriesValue {
    pub key: SensorKey,
    pub active: bool,
    pub value: Option<f64>,
    pub label: String,
    pub y: Option<f64>,
}

/// Published once per tick to live-view subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct TickUpdate {
    pub time: DateTime<Utc>,
    pub readings: ReadingSet,
    pub series: Vec<SeriesValue>,
    pub window: WindowSnapshot,
    pub recording: RecordingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    pub device: DeviceStatus,
    pub paused: bool,
    pub window: WindowSnapshot,
    pub time_frame_presets_secs: &'static [i64],
    pub recording: RecordingStatus,
    pub selection: BTreeMap<String, bool>,
    pub action_busy_until: Option<DateTime<Utc>>,
    pub last_readings: Option<ReadingSet>,
}

type Reply<T> = oneshot::Sender<T>;

pub enum MonitorCommand {
    Snapshot(Reply<SeriesSnapshot>),
    Status(Reply<MonitorStatus>),
    TogglePause(Reply<bool>),
    SetTimeFrame {
        seconds: i64,
        reply: Reply<Result<WindowSnapshot, MonitorError>>,
    },
    Scroll {
        position: u32,
        reply: Reply<WindowSnapshot>,
    },
    Track(Reply<WindowSnapshot>),
    SetSeriesActive {
        key: SensorKey,
        active: bool,
        reply: Reply<Result<(), MonitorError>>,
    },
    StartRecording {
        path: PathBuf,
        reply: Reply<Result<RecordingStatus, MonitorError>>,
    },
    StopRecording(Reply<RecordingStatus>),
    RecordingStatus(Reply<RecordingStatus>),
    RequestAction {
        seconds: u8,
        reply: Reply<Result<(), MonitorError>>,
    },
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    Shutdown,
    DeviceLost,
}

pub struct Monitor {
    buffer: SeriesBuffer,
    window: WindowController,
    recorder: Recorder,
    selection: Selection,
    device: DeviceStatus,
    paused: Arc<AtomicBool>,
    transport: Arc<dyn Transport>,
    action_busy_until: Option<DateTime<Utc>>,
    last_readings: Option<ReadingSet>,
    updates: broadcast::Sender<String>,
    recordings_dir: PathBuf,
}

impl Monitor {
    pub fn new(
        transport: Arc<dyn Transport>,
        paused: Arc<AtomicBool>,
        selection: Selection,
        window: WindowController,
        updates: broadcast::Sender<String>,
        recordings_dir: PathBuf,
    ) -> Self {
        Self {
            buffer: SeriesBuffer::new(),
            window,
            recorder: Recorder::new(),
            selection,
            device: DeviceStatus::Connecting,
            paused,
            transport,
            action_busy_until: None,
            last_readings: None,
            updates,
            recordings_dir,
        }
    }

    #[cfg(test)]
    pub fn buffer(&self) -> &SeriesBuffer {
        &self.buffer
    }

    pub fn on_tick(&mut self, readings: ReadingSet, now: DateTime<Utc>) -> TickUpdate {
        for profile in PLOTTED.iter() {
            self.buffer.append(profile.key, now, readings.get(profile.key));
        }

        let recording_error = match self.recorder.on_tick(now, &self.buffer) {
            Ok(_) => None,
            Err(err) => Some(err.to_string()),
        };

        self.buffer.evict_overflow();
        self.window.on_tick(now);
        self.last_readings = Some(readings);

        let celsius = readings.is_celsius();
        let series = PLOTTED
            .iter()
            .map(|profile| {
                let active = self.selection.is_active(profile.key);
                let value = self.buffer.latest(profile.key);
                SeriesValue {
                    key: profile.key,
                    active,
                    value,
                    label: profile.format_last_value(value, active, celsius),
                    y: value.map(|v| profile.limits.map(v)),
                }
            })
            .collect();

        TickUpdate {
            time: now,
            readings,
            series,
            window: self.window.snapshot(),
            recording: self.recorder.status(),
            recording_error,
        }
    }

    pub fn on_device_status(&mut self, status: DeviceStatus) {
        if self.device != status {
            info!(?status, "device status changed");
        }
        self.device = status;
        if status == DeviceStatus::Terminated {
            self.recorder.stop();
        }
    }

    /// Points of every active series inside the visible window.
    pub fn snapshot(&self) -> SeriesSnapshot {
        let celsius = self.last_readings.map(|r| r.is_celsius()).unwrap_or(true);
        let visible = self.window.visible();
        let series = PLOTTED
            .iter()
            .filter(|profile| self.selection.is_active(profile.key))
            .map(|profile| {
                let points = match (visible, self.buffer.get(profile.key)) {
                    (Some(range), _) => self.buffer.points_in(profile.key, range.start, range.end),
                    (None, Some(series)) => series.points().collect(),
                    (None, None) => Vec::new(),
                };
                SeriesView {
                    key: profile.key,
                    color: profile.color,
                    last_value: profile.format_last_value(self.buffer.latest(profile.key), true, celsius),
                    points: points
                        .into_iter()
                        .map(|p| PlotPoint {
                            time: p.time,
                            value: p.value,
                            label: p.label.clone(),
                            y: p.value.map(|v| profile.limits.map(v)),
                        })
                        .collect(),
                }
            })
            .collect();

        SeriesSnapshot {
            window: self.window.snapshot(),
            series,
        }
    }

    pub fn status(&self) -> MonitorStatus {
        MonitorStatus {
            device: self.device,
            paused: self.paused.load(Ordering::Relaxed),
            window: self.window.snapshot(),
            time_frame_presets_secs: &TIME_FRAME_PRESETS_SECS,
            recording: self.recorder.status(),
            selection: self.selection.to_stored(),
            action_busy_until: self.action_busy_until,
            last_readings: self.last_readings,
        }
    }

    pub fn toggle_pause(&mut self) -> bool {
        let paused = !self.paused.load(Ordering::Relaxed);
        self.paused.store(paused, Ordering::Relaxed);
        info!(paused, "acquisition pause toggled");
        paused
    }

    pub fn set_time_frame(&mut self, seconds: i64) -> Result<WindowSnapshot, MonitorError> {
        self.window.set_time_frame(time_frame_from_secs(seconds)?)?;
        Ok(self.window.snapshot())
    }

    pub fn scroll_to(&mut self, position: u32) -> WindowSnapshot {
        self.window.scroll_to(position);
        self.window.snapshot()
    }

    pub fn track(&mut self) -> WindowSnapshot {
        self.window.track();
        self.window.snapshot()
    }

    pub fn set_series_active(&mut self, key: SensorKey, active: bool) -> Result<(), MonitorError> {
        if self.recorder.is_active() {
            return Err(MonitorError::SelectionLocked);
        }
        if !key.is_plotted() {
            return Err(MonitorError::NotPlotted(key));
        }
        self.selection.set(key, active);
        Ok(())
    }

    pub fn start_recording<F>(
        &mut self,
        path: Option<PathBuf>,
        open: F,
        now: DateTime<Utc>,
    ) -> Result<RecordingStatus, MonitorError>
    where
        F: FnOnce() -> std::io::Result<RecordingSink>,
    {
        let series = self.selection.active_keys();
        self.recorder.start(series, path, open, now)?;
        Ok(self.recorder.status())
    }

    /// Starts a CSV file recording at `requested`, relative to the recordings directory.
    pub fn start_recording_file(
        &mut self,
        requested: PathBuf,
        now: DateTime<Utc>,
    ) -> Result<RecordingStatus, MonitorError> {
        let path = csv_sink::resolve(&self.recordings_dir, &requested)
            .ok_or(MonitorError::InvalidRecordingPath(requested))?;
        let opened = path.clone();
        self.start_recording(Some(path), move || csv_sink::create(&opened), now)
    }

    pub fn stop_recording(&mut self) -> RecordingStatus {
        self.recorder.stop().unwrap_or_else(|| self.recorder.status())
    }

    pub fn recording_status(&self) -> RecordingStatus {
        self.recorder.status()
    }

    pub fn request_action(&mut self, seconds: u8, now: DateTime<Utc>) -> Result<(), MonitorError> {
        if seconds == 0 || seconds > MAX_ACTION_SECS {
            return Err(MonitorError::InvalidActionDuration(seconds));
        }
        if self.device != DeviceStatus::Polling || !self.transport.is_connected() {
            return Err(MonitorError::DeviceUnavailable);
        }
        if let Some(until) = self.action_busy_until {
            if now < until {
                return Err(MonitorError::ActionBusy(until));
            }
        }
        self.transport.request_action(seconds)?;
        self.action_busy_until = Some(now + TimeDelta::seconds(seconds as i64));
        info!(seconds, "device action requested");
        Ok(())
    }

    fn publish(&self, update: &TickUpdate) {
        if self.updates.receiver_count() == 0 {
            return;
        }
        match serde_json::to_string(update) {
            Ok(payload) => {
                let _ = self.updates.send(payload);
            }
            Err(err) => warn!(%err, "failed to serialize tick update"),
        }
    }

    fn handle(&mut self, command: MonitorCommand) {
        match command {
            MonitorCommand::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            MonitorCommand::Status(reply) => {
                let _ = reply.send(self.status());
            }
            MonitorCommand::TogglePause(reply) => {
                let _ = reply.send(self.toggle_pause());
            }
            MonitorCommand::SetTimeFrame { seconds, reply } => {
                let _ = reply.send(self.set_time_frame(seconds));
            }
            MonitorCommand::Scroll { position, reply } => {
                let _ = reply.send(self.scroll_to(position));
            }
            MonitorCommand::Track(reply) => {
                let _ = reply.send(self.track());
            }
            MonitorCommand::SetSeriesActive { key, active, reply } => {
                let _ = reply.send(self.set_series_active(key, active));
            }
            MonitorCommand::StartRecording { path, reply } => {
                let result = self.start_recording_file(path, Utc::now());
                if let Err(err) = &result {
                    warn!(%err, "recording not started");
                }
                let _ = reply.send(result);
            }
            MonitorCommand::StopRecording(reply) => {
                let _ = reply.send(self.stop_recording());
            }
            MonitorCommand::RecordingStatus(reply) => {
                let _ = reply.send(self.recording_status());
            }
            MonitorCommand::RequestAction { seconds, reply } => {
                let _ = reply.send(self.request_action(seconds, Utc::now()));
            }
            MonitorCommand::Shutdown => {}
        }
    }

    /// Drives the monitor until shutdown is requested or the device is given up on.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<MonitorCommand>,
        mut events: mpsc::Receiver<AcquisitionEvent>,
        store: SelectionStore,
    ) -> MonitorExit {
        let exit = loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(MonitorCommand::Shutdown) | None => break MonitorExit::Shutdown,
                    Some(command) => self.handle(command),
                },
                event = events.recv() => match event {
                    Some(AcquisitionEvent::Tick { readings, captured_at }) => {
                        let update = self.on_tick(readings, captured_at);
                        if let Some(err) = &update.recording_error {
                            error!(%err, "recording aborted");
                        }
                        self.publish(&update);
                    }
                    Some(AcquisitionEvent::Status(status)) => {
                        self.on_device_status(status);
                        if status == DeviceStatus::Terminated {
                            break MonitorExit::DeviceLost;
                        }
                    }
                    None => break MonitorExit::DeviceLost,
                },
            }
        };

        self.recorder.stop();
        match store.save(&self.selection) {
            Ok(()) => debug!(path = %store.path().display(), "selection saved"),
            Err(err) => warn!(%err, "failed to save selection"),
        }
        info!(?exit, "monitor stopped");
        exit
    }
}

/// Cloneable entry point for user actions; every call is executed on the monitor task.
#[derive(Clone)]
pub struct MonitorHandle {
    commands: mpsc::Sender<MonitorCommand>,
    updates: broadcast::Sender<String>,
}

impl MonitorHandle {
    pub fn new(commands: mpsc::Sender<MonitorCommand>, updates: broadcast::Sender<String>) -> Self {
        Self { commands, updates }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.updates.subscribe()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> MonitorCommand,
    ) -> Result<T, MonitorError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| MonitorError::Unavailable)?;
        rx.await.map_err(|_| MonitorError::Unavailable)
    }

    pub async fn snapshot(&self) -> Result<SeriesSnapshot, MonitorError> {
        self.request(MonitorCommand::Snapshot).await
    }

    pub async fn status(&self) -> Result<MonitorStatus, MonitorError> {
        self.request(MonitorCommand::Status).await
    }

    pub async fn toggle_pause(&self) -> Result<bool, MonitorError> {
        self.request(MonitorCommand::TogglePause).await
    }

    pub async fn set_time_frame(&self, seconds: i64) -> Result<WindowSnapshot, MonitorError> {
        self.request(|reply| MonitorCommand::SetTimeFrame { seconds, reply })
            .await?
    }

    pub async fn scroll_to(&self, position: u32) -> Result<WindowSnapshot, MonitorError> {
        self.request(|reply| MonitorCommand::Scroll { position, reply }).await
    }

    pub async fn track(&self) -> Result<WindowSnapshot, MonitorError> {
        self.request(MonitorCommand::Track).await
    }

    pub async fn set_series_active(&self, key: SensorKey, active: bool) -> Result<(), MonitorError> {
        self.request(|reply| MonitorCommand::SetSeriesActive { key, active, reply })
            .await?
    }

    pub async fn start_recording(&self, path: PathBuf) -> Result<RecordingStatus, MonitorError> {
        self.request(|reply| MonitorCommand::StartRecording { path, reply })
            .await?
    }

    pub async fn stop_recording(&self) -> Result<RecordingStatus, MonitorError> {
        self.request(MonitorCommand::StopRecording).await
    }

    pub async fn recording_status(&self) -> Result<RecordingStatus, MonitorError> {
        self.request(MonitorCommand::RecordingStatus).await
    }

    pub async fn request_action(&self, seconds: u8) -> Result<(), MonitorError> {
        self.request(|reply| MonitorCommand::RequestAction { seconds, reply })
            .await?
    }

    pub async fn shutdown(&self) {
        let _ = self.commands.send(MonitorCommand::Shutdown).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::acquisition::test_support::ScriptedTransport;
    use crate::application::recorder::test_support::SharedBuffer;
    use crate::domain::reading::{normalize, RawReading};

    fn t0() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + TimeDelta::days(20_000)
    }

    fn monitor_with(transport: Arc<ScriptedTransport>) -> Monitor {
        let (updates, _) = broadcast::channel(16);
        Monitor::new(
            transport,
            Arc::new(AtomicBool::new(false)),
            Selection::default(),
            WindowController::new(TimeDelta::seconds(10)).unwrap(),
            updates,
            PathBuf::from("recordings"),
        )
    }

    fn monitor() -> Monitor {
        monitor_with(Arc::new(ScriptedTransport::new(Vec::new())))
    }

    fn readings(raw: RawReading) -> ReadingSet {
        normalize(&raw)
    }

    #[test]
    fn test_alternating_sensor_is_stored_and_recorded_as_gaps() {
        let mut monitor = monitor();
        let out = SharedBuffer::default();
        monitor.start_recording(None, || out.sink(), t0()).unwrap();

        for i in 0..5 {
            let resistance = if i % 2 == 0 { 0 } else { 1234 };
            let set = readings(RawReading {
                resistance,
                ..Default::default()
            });
            monitor.on_tick(set, t0() + TimeDelta::milliseconds(100 * (i + 1)));
        }

        let values: Vec<_> = monitor
            .buffer()
            .get(SensorKey::Resistance)
            .unwrap()
            .points()
            .map(|p| p.value)
            .collect();
        assert_eq!(values, vec![None, Some(1.234), None, Some(1.234), None]);

        let lines = out.lines();
        let header: Vec<_> = lines[0].split(',').collect();
        let column = header.iter().position(|c| *c == "Resistance").unwrap();
        let recorded: Vec<_> = lines[1..]
            .iter()
            .map(|line| line.split(',').nth(column).unwrap().to_string())
            .collect();
        assert_eq!(recorded, vec!["", "1.234", "", "1.234", ""]);
    }

    #[test]
    fn test_tick_update_carries_labels_and_display_position() {
        let mut monitor = monitor();
        let update = monitor.on_tick(
            readings(RawReading {
                is_celsius: false,
                temperature: 350,
                battery1: 145,
                ..Default::default()
            }),
            t0(),
        );

        let temperature = update.series.iter().find(|s| s.key == SensorKey::Temperature).unwrap();
        assert_eq!(temperature.label, "350 °F");
        assert_eq!(temperature.y, Some(65.0));

        let battery = update.series.iter().find(|s| s.key == SensorKey::Battery1).unwrap();
        assert_eq!(battery.value, Some(4.2));
        assert_eq!(battery.y, Some(95.0));

        let power = update.series.iter().find(|s| s.key == SensorKey::Power).unwrap();
        assert_eq!(power.label, "?");
        assert_eq!(power.y, None);
        assert!(update.window.tracking);
    }

    #[test]
    fn test_selection_is_locked_while_recording() {
        let mut monitor = monitor();
        monitor.set_series_active(SensorKey::Power, false).unwrap();
        assert!(matches!(
            monitor.set_series_active(SensorKey::IsFiring, true),
            Err(MonitorError::NotPlotted(SensorKey::IsFiring))
        ));

        let out = SharedBuffer::default();
        let status = monitor.start_recording(None, || out.sink(), t0()).unwrap();
        assert!(status.active);
        assert!(!status.series.contains(&SensorKey::Power));
        assert!(matches!(
            monitor.set_series_active(SensorKey::Power, true),
            Err(MonitorError::SelectionLocked)
        ));

        monitor.stop_recording();
        monitor.set_series_active(SensorKey::Power, true).unwrap();
    }

    #[test]
    fn test_snapshot_lists_active_series_in_visible_window() {
        let mut monitor = monitor();
        for profile in PLOTTED.iter() {
            monitor.set_series_active(profile.key, profile.key == SensorKey::OutputVoltage).unwrap();
        }
        for i in 0..30 {
            let set = readings(RawReading {
                output_voltage: 400,
                ..Default::default()
            });
            monitor.on_tick(set, t0() + TimeDelta::seconds(i));
        }

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.series.len(), 1);
        let view = &snapshot.series[0];
        assert_eq!(view.key, SensorKey::OutputVoltage);
        assert_eq!(view.last_value, "4 V");
        // live window spans the last ten seconds
        assert_eq!(view.points.len(), 11);
        assert_eq!(view.points.last().unwrap().label.as_deref(), Some("4"));
    }

    #[test]
    fn test_request_action_cooldown() {
        let transport = Arc::new(ScriptedTransport::new(Vec::new()));
        let mut monitor = monitor_with(transport.clone());

        assert!(matches!(monitor.request_action(3, t0()), Err(MonitorError::DeviceUnavailable)));
        monitor.on_device_status(DeviceStatus::Polling);

        assert!(matches!(monitor.request_action(0, t0()), Err(MonitorError::InvalidActionDuration(0))));
        assert!(matches!(monitor.request_action(10, t0()), Err(MonitorError::InvalidActionDuration(10))));

        monitor.request_action(3, t0()).unwrap();
        assert!(matches!(
            monitor.request_action(1, t0() + TimeDelta::seconds(2)),
            Err(MonitorError::ActionBusy(_))
        ));
        monitor.request_action(1, t0() + TimeDelta::seconds(3)).unwrap();
        assert_eq!(*transport.actions.lock().unwrap(), vec![3, 1]);
    }

    #[test]
    fn test_recording_file_is_kept_under_recordings_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut monitor = monitor();
        monitor.recordings_dir = dir.path().to_path_buf();

        for requested in ["../outside.csv", "/tmp/outside.csv", "nested/../../outside.csv", ""] {
            assert!(matches!(
                monitor.start_recording_file(PathBuf::from(requested), t0()),
                Err(MonitorError::InvalidRecordingPath(_))
            ));
        }
        assert!(!monitor.recording_status().active);

        let status = monitor.start_recording_file(PathBuf::from("bench/run.csv"), t0()).unwrap();
        let expected = dir.path().join("bench").join("run.csv");
        assert_eq!(status.path.as_deref(), Some(expected.as_path()));
        monitor.stop_recording();
        let contents = std::fs::read_to_string(&expected).unwrap();
        assert!(contents.starts_with("Time,"));
    }

    #[test]
    fn test_oversized_time_frame_is_rejected_and_ticks_continue() {
        let mut monitor = monitor();
        assert!(matches!(
            monitor.set_time_frame(i64::MAX),
            Err(MonitorError::Window(WindowError::TimeFrameTooLong(_)))
        ));

        monitor.on_tick(readings(RawReading::default()), t0());
        assert!(monitor.set_time_frame(10_000_000_000_000).is_err());
        assert!(monitor.set_time_frame(-5).is_err());

        let update = monitor.on_tick(readings(RawReading::default()), t0() + TimeDelta::seconds(1));
        assert_eq!(update.window.time_frame_secs, 10.0);
        assert_eq!(monitor.snapshot().window.time_frame_secs, 10.0);
    }

    #[test]
    fn test_device_loss_closes_recording() {
        let mut monitor = monitor();
        let out = SharedBuffer::default();
        monitor.start_recording(None, || out.sink(), t0()).unwrap();
        monitor.on_device_status(DeviceStatus::Terminated);
        assert!(!monitor.recording_status().active);
    }

    #[tokio::test]
    async fn test_run_serves_commands_and_saves_selection() {
        let dir = tempfile::tempdir().unwrap();
        let store = SelectionStore::new(dir.path().join("selection.toml"));

        let monitor = monitor();
        let (updates, _) = broadcast::channel(16);
        let (command_tx, command_rx) = mpsc::channel(8);
        let (event_tx, event_rx) = mpsc::channel(8);
        let handle = MonitorHandle::new(command_tx, updates);
        let task = tokio::spawn(monitor.run(command_rx, event_rx, store.clone()));

        event_tx
            .send(AcquisitionEvent::Tick {
                readings: readings(RawReading {
                    power_set: 400,
                    ..Default::default()
                }),
                captured_at: t0(),
            })
            .await
            .unwrap();

        handle.set_series_active(SensorKey::Power, false).await.unwrap();
        assert!(handle.set_time_frame(0).await.is_err());
        let window = handle.set_time_frame(20).await.unwrap();
        assert_eq!(window.time_frame_secs, 20.0);

        let status = handle.status().await.unwrap();
        assert_eq!(status.last_readings.unwrap().get(SensorKey::PowerSet), 40.0);
        assert!(handle.toggle_pause().await.unwrap());

        handle.shutdown().await;
        assert_eq!(task.await.unwrap(), MonitorExit::Shutdown);
        assert!(!store.load().is_active(SensorKey::Power));
        assert!(handle.status().await.is_err());
    }

    #[tokio::test]
    async fn test_run_exits_when_device_is_lost() {
        let dir = tempfile::tempdir().unwrap();
        let store = SelectionStore::new(dir.path().join("selection.toml"));
        let (_command_tx, command_rx) = mpsc::channel(8);
        let (event_tx, event_rx) = mpsc::channel(8);
        let task = tokio::spawn(monitor().run(command_rx, event_rx, store));

        event_tx
            .send(AcquisitionEvent::Status(DeviceStatus::Terminated))
            .await
            .unwrap();
        assert_eq!(task.await.unwrap(), MonitorExit::DeviceLost);
    }
}
