// Transport trait for the device link
use crate::infrastructure::frame_codec::DecodeError;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("device read failed: {0}")]
    Read(#[from] std::io::Error),
    #[error("device is not connected")]
    Disconnected,
    #[error("invalid monitoring frame: {0}")]
    Decode(#[from] DecodeError),
}

/// Device link used by the acquisition loop.
///
/// `read_frame` blocks for at most the transport's own timeout. Implementations
/// are shared between the acquisition thread and the monitor, so every method
/// takes `&self`.
pub trait Transport: Send + Sync {
    fn read_frame(&self) -> Result<Vec<u8>, TransportError>;

    fn is_connected(&self) -> bool;

    /// Fire-and-forget device stimulus (for example a timed firing).
    fn request_action(&self, duration_secs: u8) -> Result<(), TransportError>;
}
