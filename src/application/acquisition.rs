// Acquisition loop - polls the transport on a dedicated thread and hands readings to the monitor
use crate::application::transport::{Transport, TransportError};
use crate::domain::reading::{normalize, ReadingSet};
use crate::infrastructure::frame_codec;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DeviceStatus {
    Connecting,
    Polling,
    Disconnected,
    Reconnecting { attempt: u32 },
    Terminated,
}

#[derive(Debug, Clone)]
pub enum AcquisitionEvent {
    Tick {
        readings: ReadingSet,
        captured_at: DateTime<Utc>,
    },
    Status(DeviceStatus),
}

#[derive(Debug, Clone, Copy)]
pub struct AcquisitionSettings {
    pub poll_interval: Duration,
    pub reconnect_interval: Duration,
    pub max_reconnect_attempts: u32,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            reconnect_interval: Duration::from_secs(1),
            max_reconnect_attempts: 30,
        }
    }
}

enum PollExit {
    Failed(TransportError),
    Closed,
}

pub struct AcquisitionLoop {
    transport: Arc<dyn Transport>,
    events: mpsc::Sender<AcquisitionEvent>,
    paused: Arc<AtomicBool>,
    settings: AcquisitionSettings,
}

impl AcquisitionLoop {
    pub fn new(
        transport: Arc<dyn Transport>,
        events: mpsc::Sender<AcquisitionEvent>,
        paused: Arc<AtomicBool>,
        settings: AcquisitionSettings,
    ) -> Self {
        Self {
            transport,
            events,
            paused,
            settings,
        }
    }

    pub fn spawn(self) -> std::io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name("acquisition".to_string())
            .spawn(move || self.run())
    }

    /// Runs until the device is given up on or the monitor stops listening.
    pub fn run(self) {
        let mut status = DeviceStatus::Connecting;
        loop {
            if !self.publish(AcquisitionEvent::Status(status)) {
                debug!("monitor gone, stopping acquisition");
                return;
            }

            status = match status {
                DeviceStatus::Connecting => {
                    if self.transport.is_connected() {
                        DeviceStatus::Polling
                    } else {
                        DeviceStatus::Reconnecting { attempt: 1 }
                    }
                }
                DeviceStatus::Disconnected => {
                    if self.transport.is_connected() {
                        // still attached: restart at the regular cadence, never back-to-back
                        thread::sleep(self.settings.poll_interval);
                        DeviceStatus::Polling
                    } else {
                        DeviceStatus::Reconnecting { attempt: 1 }
                    }
                }
                DeviceStatus::Polling => match self.poll() {
                    PollExit::Failed(err) => {
                        warn!(%err, "acquisition stopped");
                        DeviceStatus::Disconnected
                    }
                    PollExit::Closed => {
                        debug!("monitor gone, stopping acquisition");
                        return;
                    }
                },
                DeviceStatus::Reconnecting { attempt } => {
                    thread::sleep(self.settings.reconnect_interval);
                    if self.transport.is_connected() {
                        info!(attempt, "device reconnected");
                        DeviceStatus::Polling
                    } else if attempt >= self.settings.max_reconnect_attempts {
                        DeviceStatus::Terminated
                    } else {
                        DeviceStatus::Reconnecting { attempt: attempt + 1 }
                    }
                }
                DeviceStatus::Terminated => {
                    warn!("device not reconnected, acquisition terminated");
                    return;
                }
            };
        }
    }

    fn poll(&self) -> PollExit {
        loop {
            if self.events.is_closed() {
                return PollExit::Closed;
            }

            if !self.paused.load(Ordering::Relaxed) {
                let readings = match self.read_once() {
                    Ok(readings) => readings,
                    Err(err) => return PollExit::Failed(err),
                };
                let tick = AcquisitionEvent::Tick {
                    readings,
                    captured_at: Utc::now(),
                };
                if !self.publish(tick) {
                    return PollExit::Closed;
                }
            }

            thread::sleep(self.settings.poll_interval);
        }
    }

    fn read_once(&self) -> Result<ReadingSet, TransportError> {
        let frame = self.transport.read_frame()?;
        let raw = frame_codec::decode(&frame)?;
        Ok(normalize(&raw))
    }

    fn publish(&self, event: AcquisitionEvent) -> bool {
        self.events.blocking_send(event).is_ok()
    }
}
