pub mod backup;
pub mod commit;
pub mod restore;
pub mod stats;

use anyhow::Result;
use std::path::Path;

use crate::errors::KeeperError;

/// Run blocking filesystem work off the async runtime and wait for it
pub(crate) async fn blocking<F, T>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}

/// Whether `path` exists; a stat that fails for any other reason is an error
pub(crate) async fn path_exists(path: &Path) -> Result<bool> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| KeeperError::from_io(path, &e).into())
}
