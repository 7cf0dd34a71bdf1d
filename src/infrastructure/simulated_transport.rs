// Simulated device - synthesizes monitoring frames so the pipeline runs without hardware
use crate::application::transport::{Transport, TransportError};
use crate::domain::reading::RawReading;
use crate::infrastructure::frame_codec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const AMBIENT_TEMPERATURE: f64 = 80.0;
const COIL_MILLIOHM: u16 = 150;

struct SimulatedState {
    started: Instant,
    firing_until: Option<Instant>,
    temperature: f64,
}

pub struct SimulatedTransport {
    state: Mutex<SimulatedState>,
    connected: AtomicBool,
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimulatedState {
                started: Instant::now(),
                firing_until: None,
                temperature: AMBIENT_TEMPERATURE,
            }),
            connected: AtomicBool::new(true),
        }
    }

    /// Marks the device unplugged or plugged back in.
    #[cfg(test)]
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    fn sample(state: &mut SimulatedState, now: Instant) -> RawReading {
        let firing = state.firing_until.is_some_and(|until| now < until);
        if !firing {
            state.firing_until = None;
        }

        // coil heats while firing and cools towards ambient otherwise
        let target = if firing { 450.0 } else { AMBIENT_TEMPERATURE };
        state.temperature += (target - state.temperature) * 0.2;

        let uptime = now.duration_since(state.started);
        let sag = if firing { 12 } else { 0 };
        let drift = (uptime.as_secs() / 60).min(40) as u8;
        let cell = 140u8.saturating_sub(drift).saturating_sub(sag);

        RawReading {
            timestamp: (uptime.as_millis() / 10) as u32,
            is_firing: firing,
            is_charging: false,
            is_celsius: false,
            battery1: cell,
            battery2: cell,
            battery3: 0,
            power_set: 400,
            temperature_set: 450,
            temperature: state.temperature.round() as u16,
            output_voltage: if firing { 245 } else { 0 },
            output_current: if firing { 1630 } else { 0 },
            resistance: COIL_MILLIOHM,
            real_resistance: COIL_MILLIOHM + (state.temperature - AMBIENT_TEMPERATURE).max(0.0) as u16 / 10,
            board_temperature: 28 + firing as u8 * 4,
        }
    }
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SimulatedTransport {
    fn read_frame(&self) -> Result<Vec<u8>, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected);
        }
        let mut state = self.state.lock().map_err(|_| TransportError::Disconnected)?;
        let raw = Self::sample(&mut state, Instant::now());
        Ok(frame_codec::encode(&raw))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn request_action(&self, duration_secs: u8) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected);
        }
        let mut state = self.state.lock().map_err(|_| TransportError::Disconnected)?;
        state.firing_until = Some(Instant::now() + Duration::from_secs(duration_secs as u64));
        tracing::debug!(duration_secs, "simulated firing started");
        Ok(())
    }
}
