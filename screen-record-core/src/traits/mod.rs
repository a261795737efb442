pub mod capture_surface;
pub mod clock;
pub mod display_source;
pub mod media_muxer;
pub mod session_delegate;
pub mod video_encoder;
