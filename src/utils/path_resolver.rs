use anyhow::Result;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "oncopredict";
const AUTOSAVE_FILE: &str = "oncopredict_autosave.json";

/// Resolve the per-user data folder (absolute path), creating it if needed.
///
/// Prefers the platform local data dir (`~/.local/share/oncopredict` on Linux), then falls
/// back to `./.oncopredict` under the working directory.
pub fn resolve_data_folder() -> Result<PathBuf> {
    let dir = match dirs::data_local_dir() {
        Some(base) => base.join(APP_DIR),
        None => std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(format!(".{}", APP_DIR)),
    };
    std::fs::create_dir_all(&dir)
        .map_err(|e| anyhow::anyhow!("Failed to create data folder {:?}: {}", dir, e))?;
    Ok(dir)
}

/// Location of the single auto-save document.
pub fn resolve_autosave_path(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = configured {
        return Ok(p.to_path_buf());
    }
    Ok(resolve_data_folder()?.join(AUTOSAVE_FILE))
}

/// Resolve log folder (absolute path)
pub fn resolve_log_folder(configured: Option<&Path>) -> Result<PathBuf> {
    let log_dir = match configured {
        Some(p) => p.to_path_buf(),
        None => resolve_data_folder()?.join("logs"),
    };
    std::fs::create_dir_all(&log_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create log folder: {}", e))?;
    Ok(log_dir)
}

/// Resolve report export folder. Defaults to the user's document folder, then the data folder.
pub fn resolve_export_folder(configured: Option<&Path>) -> Result<PathBuf> {
    let dir = match configured {
        Some(p) => p.to_path_buf(),
        None => match dirs::document_dir() {
            Some(d) => d,
            None => resolve_data_folder()?.join("reports"),
        },
    };
    std::fs::create_dir_all(&dir)
        .map_err(|e| anyhow::anyhow!("Failed to create export folder {:?}: {}", dir, e))?;
    Ok(dir)
}
