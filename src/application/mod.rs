// Application layer - acquisition, recording and the monitor owner task
pub mod acquisition;
pub mod monitor;
pub mod recorder;
pub mod transport;
