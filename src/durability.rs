//! Durability controller (§4.9): decides when a write's WAL frame gets
//! fsync'd based on the active mode.
//!
//! Grounded on the teacher's `recovery/wasp/wal.rs::TinyWal::append`, which
//! unconditionally calls `sync_data()` after every append — that behavior
//! is this controller's `Safe` mode; `Batch`/`Unsafe` generalize it to defer
//! or skip the sync per spec.md §4.9.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurabilityMode {
    /// fsync the WAL after every committed write.
    Safe,
    /// fsync after every `N` committed writes (or on explicit checkpoint).
    Batch(u32),
    /// Never fsync except on explicit checkpoint; fastest, least durable.
    Unsafe,
}

impl Default for DurabilityMode {
    fn default() -> Self {
        DurabilityMode::Safe
    }
}

/// Tracks writes-since-last-sync and tells the caller when to fsync.
#[derive(Debug, Default)]
pub struct DurabilityController {
    mode: DurabilityMode,
    pending_since_sync: u32,
}

impl DurabilityController {
    #[must_use]
    pub fn new(mode: DurabilityMode) -> Self {
        Self { mode, pending_since_sync: 0 }
    }

    #[must_use]
    pub fn mode(&self) -> DurabilityMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: DurabilityMode) {
        self.mode = mode;
        self.pending_since_sync = 0;
    }

    /// Call after each committed write; returns whether the caller should
    /// fsync now.
    pub fn record_write(&mut self) -> bool {
        self.pending_since_sync += 1;
        match self.mode {
            DurabilityMode::Safe => {
                self.pending_since_sync = 0;
                true
            }
            DurabilityMode::Batch(n) => {
                if self.pending_since_sync >= n.max(1) {
                    self.pending_since_sync = 0;
                    true
                } else {
                    false
                }
            }
            DurabilityMode::Unsafe => false,
        }
    }

    /// An explicit checkpoint always syncs and resets the counter,
    /// regardless of mode (§4.9: "checkpoint is always durable").
    pub fn note_checkpoint(&mut self) {
        self.pending_since_sync = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_mode_syncs_every_write() {
        let mut c = DurabilityController::new(DurabilityMode::Safe);
        assert!(c.record_write());
        assert!(c.record_write());
    }

    #[test]
    fn batch_mode_syncs_every_n_writes() {
        let mut c = DurabilityController::new(DurabilityMode::Batch(3));
        assert!(!c.record_write());
        assert!(!c.record_write());
        assert!(c.record_write());
        assert!(!c.record_write());
    }

    #[test]
    fn unsafe_mode_never_syncs_on_write() {
        let mut c = DurabilityController::new(DurabilityMode::Unsafe);
        for _ in 0..10 {
            assert!(!c.record_write());
        }
    }
}
