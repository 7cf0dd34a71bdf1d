// Infrastructure layer - Device codecs, transports and file-backed adapters
pub mod config;
pub mod csv_sink;
pub mod firmware_codec;
pub mod frame_codec;
pub mod replay_transport;
pub mod selection_store;
pub mod simulated_transport;
