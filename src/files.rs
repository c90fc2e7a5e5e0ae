use std::path::Path;

use tracing::{debug, info};

use crate::error::{Error, Result};

/// Creates `folder_path` (and its parents) when absent. Safe to call repeatedly.
pub fn ensure_folder_exists<P: AsRef<Path>>(folder_path: P) -> Result<()> {
    let path = folder_path.as_ref();
    if path.is_dir() {
        debug!(path = %path.display(), "folder already exists");
        return Ok(());
    }
    std::fs::create_dir_all(path).map_err(|e| Error::io(path, e))?;
    info!(path = %path.display(), "folder created");
    Ok(())
}
