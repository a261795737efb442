use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::error::RecordError;
use crate::models::recording_result::RecordingMetadata;

/// Path of the JSON sidecar for `recording_path`.
pub fn metadata_path(recording_path: &Path) -> PathBuf {
    recording_path.with_extension("metadata.json")
}

/// Write recording metadata as a JSON sidecar file.
///
/// Creates `{recording_stem}.metadata.json` alongside the recording.
pub fn write_metadata(metadata: &RecordingMetadata, recording_path: &Path) -> Result<(), RecordError> {
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| RecordError::Storage(format!("failed to serialize metadata: {}", e)))?;
    fs::write(metadata_path(recording_path), json)
        .map_err(|e| RecordError::Storage(format!("failed to write metadata: {}", e)))?;
    Ok(())
}

/// Read recording metadata from a JSON sidecar file.
pub fn read_metadata(recording_path: &Path) -> Result<RecordingMetadata, RecordError> {
    let json = fs::read_to_string(metadata_path(recording_path))
        .map_err(|e| RecordError::Storage(format!("failed to read metadata: {}", e)))?;
    serde_json::from_str(&json).map_err(|e| RecordError::Storage(format!("failed to parse metadata: {}", e)))
}

/// SHA-256 hex digest of a finished recording.
pub fn file_checksum(path: &Path) -> Result<String, RecordError> {
    let data = fs::read(path)
        .map_err(|e| RecordError::Storage(format!("failed to read file for checksum: {}", e)))?;
    Ok(hex_encode(&Sha256::digest(&data)))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
