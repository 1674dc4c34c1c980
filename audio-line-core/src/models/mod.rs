pub mod config;
pub mod error;
pub mod event;
pub mod format;
pub mod line_info;
pub mod state;
