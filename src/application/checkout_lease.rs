//! In-process checkout debounce lease.
//!
//! At most one checkout in flight per user per instance, enforced
//! with a bounded-expiry entry so a crashed request never wedges a
//! user. Advisory only: correctness comes from the idempotent
//! reconciliation path, not from this lease.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Default lease lifetime. Long enough to cover a slow provider
/// round trip, short enough that an abandoned attempt clears fast.
const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Per-user checkout lease table.
pub struct CheckoutLease {
    leases: Arc<Mutex<HashMap<String, Instant>>>,
    ttl: Duration,
}

impl CheckoutLease {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            leases: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Tries to take the lease for a user. Returns false when a
    /// non-expired lease is already held.
    pub async fn acquire(&self, user_id: &str) -> bool {
        let mut leases = self.leases.lock().await;
        let now = Instant::now();
        leases.retain(|_, expires| *expires > now);

        if leases.contains_key(user_id) {
            return false;
        }
        leases.insert(user_id.to_string(), now + self.ttl);
        true
    }

    /// Releases the lease after the checkout attempt settles.
    pub async fn release(&self, user_id: &str) {
        self.leases.lock().await.remove(user_id);
    }
}

impl Default for CheckoutLease {
    fn default() -> Self {
        Self::new()
    }
}
