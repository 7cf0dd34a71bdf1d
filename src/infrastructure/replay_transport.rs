// Capture-file replay - plays back back-to-back monitoring frames recorded from a device
use crate::application::transport::{Transport, TransportError};
use crate::infrastructure::frame_codec::FRAME_LEN;
use anyhow::Context;
use bytes::{Buf, Bytes};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub struct ReplayTransport {
    frames: Mutex<Bytes>,
    connected: AtomicBool,
}

impl ReplayTransport {
    pub fn new(capture: impl Into<Bytes>) -> Self {
        Self {
            frames: Mutex::new(capture.into()),
            connected: AtomicBool::new(true),
        }
    }

    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let capture = std::fs::read(path)
            .with_context(|| format!("failed to read capture file {}", path.display()))?;
        if capture.len() % FRAME_LEN != 0 {
            tracing::warn!(
                path = %path.display(),
                trailing = capture.len() % FRAME_LEN,
                "capture file ends with a partial frame"
            );
        }
        let transport = Self::new(capture);
        tracing::info!(path = %path.display(), frames = transport.remaining_frames(), "replaying capture");
        Ok(transport)
    }

    pub fn remaining_frames(&self) -> usize {
        self.frames.lock().map(|f| f.len() / FRAME_LEN).unwrap_or(0)
    }
}

impl Transport for ReplayTransport {
    /// Yields the next frame; a truncated tail is returned as-is and fails decoding.
    fn read_frame(&self) -> Result<Vec<u8>, TransportError> {
        let mut frames = self.frames.lock().map_err(|_| TransportError::Disconnected)?;
        if !frames.has_remaining() {
            self.connected.store(false, Ordering::SeqCst);
            return Err(TransportError::Disconnected);
        }
        let take = frames.remaining().min(FRAME_LEN);
        Ok(frames.split_to(take).to_vec())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn request_action(&self, _duration_secs: u8) -> Result<(), TransportError> {
        tracing::debug!("replayed device ignores actions");
        Ok(())
    }
}
