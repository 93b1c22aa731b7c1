use anyhow::Result;
use std::ffi::OsStr;
use std::path::Path;
use tracing::info;

use crate::services::commands;
use crate::types::Owner;

/// Recursively hand `path` over to `owner`
pub async fn apply_owner(path: &Path, owner: &Owner) -> Result<()> {
    info!("Setting ownership of {} to {}", path.display(), owner);

    let spec = owner.to_string();
    let args = [OsStr::new("-R"), OsStr::new(&spec), path.as_os_str()];
    commands::run_checked("chown", args, None).await?;

    info!("Ownership of {} set to {}", path.display(), owner);
    Ok(())
}
