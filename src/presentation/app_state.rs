// Application state for HTTP handlers
use crate::application::monitor::MonitorHandle;
use tokio::sync::watch;

#[derive(Clone)]
pub struct AppState {
    pub monitor: MonitorHandle,
    /// Flips once the server starts shutting down so open event streams end.
    pub shutdown: watch::Receiver<bool>,
}
