//! Filesystem staging: the bridge working directory, the shared library, and
//! the process discovery file.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::config::BridgeConfig;
use crate::error::Result;

/// Create the bridge directory and stage the shared library if missing.
pub fn prepare(config: &BridgeConfig) -> Result<()> {
    fs::create_dir_all(&config.bridge_dir)?;
    stage_library(config)
}

/// Copy the shared library from the executable's directory unless it is
/// already staged. A missing source is logged, not fatal.
fn stage_library(config: &BridgeConfig) -> Result<()> {
    let target = config.staged_library_path();
    if target.exists() {
        debug!("{} already staged", target.display());
        return Ok(());
    }

    let name = match target.file_name() {
        Some(name) => name.to_owned(),
        None => return Ok(()),
    };

    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let source = dir.join(&name);
            if source.exists() {
                fs::copy(&source, &target)?;
                info!("Staged {} -> {}", source.display(), target.display());
                return Ok(());
            }
        }
    }

    debug!(
        "{} not found beside the executable, skipping staging",
        name.to_string_lossy()
    );
    Ok(())
}

/// Write `"<pid>:<port>"` (no trailing newline) to the discovery file.
pub fn write_process_file(path: &Path, port: u16) -> Result<()> {
    let contents = format!("{}:{}", std::process::id(), port);
    fs::write(path, contents)?;
    info!("Discovery file written: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_write_process_file_format() {
        let path = std::env::temp_dir().join("ds3-bridge-test-process.txt");
        write_process_file(&path, 40123).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, format!("{}:40123", std::process::id()));
        assert!(!contents.ends_with('\n'));
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_prepare_creates_bridge_dir() {
        let dir = std::env::temp_dir().join("ds3-bridge-test-staging");
        let _ = fs::remove_dir_all(&dir);
        let config = BridgeConfig {
            bridge_dir: dir.clone(),
            process_file: PathBuf::from("process.txt"),
            staged_library: PathBuf::from("libaio.so"),
        };
        // no library next to the test binary: staging is skipped, not fatal
        prepare(&config).unwrap();
        assert!(dir.is_dir());
        let _ = fs::remove_dir_all(&dir);
    }
}
