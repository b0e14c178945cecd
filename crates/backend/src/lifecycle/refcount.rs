//! Persistent count of sessions that depend on the background service.

use tracing::{debug, warn};

use super::store::LifecycleStore;

/// Reference counter stored as a single integer in the shared directory.
///
/// Reads never fail: a missing or corrupt file counts as zero. Writes are
/// best-effort; a failed write is logged and the caller proceeds with the
/// value it computed.
#[derive(Debug, Clone)]
pub struct ReferenceCounter {
  store: LifecycleStore,
}

impl ReferenceCounter {
  pub fn new(store: LifecycleStore) -> Self {
    Self { store }
  }

  /// Current number of dependent sessions
  pub async fn get(&self) -> u64 {
    self.store.read_u64(&self.store.reference_count_file()).await.unwrap_or(0)
  }

  /// Register one more session. Returns the new count.
  pub async fn increment(&self) -> u64 {
    let count = self.get().await.saturating_add(1);
    self.write(count).await;
    debug!(count, "Reference count incremented");
    count
  }

  /// Release one session, clamping at zero. Returns the new count.
  pub async fn decrement(&self) -> u64 {
    let count = self.get().await.saturating_sub(1);
    self.write(count).await;
    debug!(count, "Reference count decremented");
    count
  }

  /// Forget all references by removing the counter file
  pub async fn reset(&self) {
    if let Err(e) = self.store.remove(&self.store.reference_count_file()).await {
      warn!("Failed to remove reference count file: {}", e);
    }
  }

  async fn write(&self, count: u64) {
    let path = self.store.reference_count_file();
    if let Err(e) = self.store.write_u64(&path, count).await {
      warn!(path = ?path, "Failed to write reference count: {}", e);
    }
  }
}
