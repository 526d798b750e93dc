use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

/// Per-filename advisory locks for the shared storage root.
///
/// Two concurrent uploads of the same name would otherwise race on one
/// destination file. Locks are created on demand; the guard is held
/// for the duration of the owning transfer's write.
#[derive(Default)]
pub struct FileLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl FileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for `name`, waiting if another transfer holds it.
    pub async fn acquire(&self, name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap();
            Arc::clone(map.entry(name.to_string()).or_default())
        };
        if lock.try_lock().is_err() {
            tracing::debug!(name, "waiting on per-file lock");
        }
        lock.lock_owned().await
    }
}
