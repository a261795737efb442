pub mod container_sink;
pub mod metadata;
pub mod output_sink;
pub mod raw_sink;
