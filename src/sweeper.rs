use crate::db::Db;
use crate::okta::CsrfStateStore;
use crate::vault::Vault;
use std::sync::Arc;

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct SweepResult {
    /// PENDING rows past their deadline flipped to EXPIRED.
    pub metadata_expired: i64,
    /// PENDING rows whose blob was already gone (mark-as-read drift or
    /// eviction) flipped to EXPIRED.
    pub orphaned: i64,
    /// Vault entries past their TTL dropped.
    pub vault_purged: usize,
    /// Stale OIDC login states dropped.
    pub states_dropped: usize,
}

impl SweepResult {
    pub fn expired_count(&self) -> i64 {
        self.metadata_expired + self.orphaned
    }
}

/// One idempotent sweep. Safe to run at any cadence and from the manual
/// admin trigger concurrently with the background task.
pub fn run_sweep(db: &Db, vault: &Vault, states: &CsrfStateStore) -> SweepResult {
    let mut result = SweepResult {
        metadata_expired: db.cleanup_expired().unwrap_or(0),
        ..SweepResult::default()
    };

    // Any still-PENDING row must have a live blob; a missing blob means the
    // message is unreadable and the row is stale.
    if let Ok(pending) = db.pending_message_ids() {
        for id in pending {
            if !vault.exists(&id) {
                match db.mark_expired_if_pending(&id) {
                    Ok(true) => result.orphaned += 1,
                    _ => {}
                }
            }
        }
    }

    result.vault_purged = vault.purge_expired();
    result.states_dropped = states.sweep();
    result
}

/// Spawns the periodic sweep. Opens its own database handle so the request
/// path never waits on the sweeper's lock.
pub fn spawn_sweep_task(
    db_path: String,
    vault: Arc<Vault>,
    states: Arc<CsrfStateStore>,
    interval_secs: u64,
) {
    tokio::spawn(async move {
        let db = Db::new(&db_path);

        // Let the server come up before the first pass.
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;

        loop {
            let result = run_sweep(&db, &vault, &states);
            if result.expired_count() > 0 || result.vault_purged > 0 {
                println!(
                    "🧹 Sweep: {} metadata rows expired ({} orphaned), {} vault entries purged",
                    result.expired_count(),
                    result.orphaned,
                    result.vault_purged
                );
            }
            tokio::time::sleep(std::time::Duration::from_secs(interval_secs)).await;
        }
    });
}
