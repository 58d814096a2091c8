//! Test helpers for file-backed stores.

use tempfile::TempDir;

use crate::error::StoreResult;
use crate::store::Store;

/// Create a store rooted in a fresh temporary directory.
///
/// Keep the returned `TempDir` alive for as long as the store is used.
pub async fn create_test_store() -> StoreResult<(TempDir, Store)> {
    let dir = TempDir::new()?;
    let store = Store::open(dir.path(), "data", "file").await?;
    Ok((dir, store))
}
