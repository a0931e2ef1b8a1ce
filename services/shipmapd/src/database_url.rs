use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

const MEMORY_PREFIX: &str = "sqlite::memory:";
const URL_PREFIX: &str = "sqlite://";

/// Filesystem part of a `sqlite://` URL, `None` for in-memory databases.
fn database_file(url: &str) -> Option<PathBuf> {
    let rest = url.strip_prefix(URL_PREFIX)?;
    let (path_part, _) = rest.split_once('?').unwrap_or((rest, ""));
    Some(PathBuf::from(path_part))
}

pub fn validate_database_url(url: &str) -> Result<()> {
    if url.starts_with(MEMORY_PREFIX) {
        return Ok(());
    }
    if !url.starts_with(URL_PREFIX) {
        bail!("database url must start with `sqlite://` or use `sqlite::memory:`");
    }
    match database_file(url) {
        Some(path) if !path.as_os_str().is_empty() => Ok(()),
        _ => bail!("database url is missing a filesystem component after `sqlite://`"),
    }
}

pub fn ensure_database_parent_dir(url: &str) -> Result<()> {
    let Some(path) = database_file(url) else {
        return Ok(());
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    Ok(())
}
