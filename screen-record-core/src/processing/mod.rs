pub mod metadata_track;
pub mod projection;
