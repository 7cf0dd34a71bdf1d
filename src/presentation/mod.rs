// Presentation layer - HTTP surface for the live view
pub mod app_state;
pub mod handlers;
