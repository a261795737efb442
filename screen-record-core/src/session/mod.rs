pub mod capture_source;
pub mod controller;
pub mod stop_signal;
