//! Environment/runtime helpers
//!
//! Sanity checks to ensure expected directories and data files exist at startup.

use std::path::Path;

use tracing::debug;

/// Ensure the parent directory of `file` exists, creating it recursively if needed.
pub async fn ensure_parent_dir(file: &Path) -> anyhow::Result<()> {
    if let Some(parent) = file.parent() {
        if parent.as_os_str().is_empty() {
            return Ok(());
        }
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| anyhow::anyhow!("cannot create {}: {e}", parent.display()))?;
    }
    Ok(())
}

/// Ensure `file` exists, seeding it with an empty JSON object when missing.
/// An existing file is left untouched, whatever it contains.
pub async fn ensure_json_file(file: &Path) -> anyhow::Result<()> {
    ensure_parent_dir(file).await?;
    match tokio::fs::metadata(file).await {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(anyhow::anyhow!("{} exists but is not a regular file", file.display())),
        Err(_) => {
            debug!(path = %file.display(), "seeding empty json data file");
            tokio::fs::write(file, b"{}")
                .await
                .map_err(|e| anyhow::anyhow!("cannot create {}: {e}", file.display()))
        }
    }
}
