//! Bridge configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Main bridge configuration
///
/// Loaded from an optional JSON file; every field has a default so a missing
/// or partial file works. CLI arguments override individual fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Working directory for the staged library and the discovery file
    pub bridge_dir: PathBuf,
    /// Discovery file, resolved against `bridge_dir` unless absolute
    pub process_file: PathBuf,
    /// Shared library to stage, resolved against `bridge_dir` unless absolute
    pub staged_library: PathBuf,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bridge_dir: PathBuf::from("/data/local/tmp/ds3_bridge"),
            process_file: PathBuf::from("process.txt"),
            staged_library: PathBuf::from("libaio.so"),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            BridgeError::Config(format!("Failed to parse config {}: {}", path.display(), e))
        })
    }

    /// Absolute path of the discovery file
    pub fn process_file_path(&self) -> PathBuf {
        self.resolve(&self.process_file)
    }

    /// Absolute path of the staged shared library
    pub fn staged_library_path(&self) -> PathBuf {
        self.resolve(&self.staged_library)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.bridge_dir.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.bridge_dir, PathBuf::from("/data/local/tmp/ds3_bridge"));
        assert_eq!(
            config.process_file_path(),
            PathBuf::from("/data/local/tmp/ds3_bridge/process.txt")
        );
        assert_eq!(
            config.staged_library_path(),
            PathBuf::from("/data/local/tmp/ds3_bridge/libaio.so")
        );
    }

    #[test]
    fn test_absolute_paths_kept() {
        let config = BridgeConfig {
            process_file: PathBuf::from("/run/ds3.txt"),
            ..Default::default()
        };
        assert_eq!(config.process_file_path(), PathBuf::from("/run/ds3.txt"));
    }

    #[test]
    fn test_partial_json() {
        let config: BridgeConfig =
            serde_json::from_str(r#"{"bridge_dir": "/tmp/pad"}"#).unwrap();
        assert_eq!(config.bridge_dir, PathBuf::from("/tmp/pad"));
        assert_eq!(config.process_file_path(), PathBuf::from("/tmp/pad/process.txt"));
    }
}
