pub mod config;
pub mod display;
pub mod error;
pub mod recording_result;
pub mod sample;
pub mod state;
