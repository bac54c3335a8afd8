//! RailView Metrics Module
//! =======================
//!
//! Counters kept by the overlay synchronizer across reconciliation passes:
//! - how many features were added, updated, left alone or removed
//! - how many entities were excluded for lacking coordinates
//! - how many snapshots arrived stale and were dropped
//! - how often the surface refused a write
//!
//! The simulation runner reports these; nothing in the engines branches on
//! them.

use serde::{Deserialize, Serialize};

/// Per-pass diff between the surface's previous collection and the new one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileStats {
    /// Features whose id was not on the surface before
    pub added: usize,
    /// Features whose id existed but whose geometry or properties changed
    pub updated: usize,
    /// Features identical to what the surface already had
    pub unchanged: usize,
    /// Ids on the surface that are absent from the snapshot
    pub removed: usize,
    /// Snapshot entities skipped for missing or invalid coordinates
    pub excluded: usize,
}

impl ReconcileStats {
    /// Number of features rendered after the pass.
    pub fn rendered(&self) -> usize {
        self.added + self.updated + self.unchanged
    }

    /// True if the pass did not change the surface.
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.updated == 0 && self.removed == 0
    }
}

/// Running totals across all passes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverlayMetrics {
    /// Passes that reached the surface
    pub passes_applied: u64,
    /// Snapshots dropped because a fresher one was already applied
    pub stale_dropped: u64,
    /// Passes or blink writes the surface refused
    pub surface_failures: u64,
    pub features_added: u64,
    pub features_updated: u64,
    pub features_removed: u64,
    pub entities_excluded: u64,
    /// Blink phase flips
    pub blink_toggles: u64,
}

impl OverlayMetrics {
    /// Folds one applied pass into the totals.
    pub fn record(&mut self, stats: &ReconcileStats) {
        self.passes_applied += 1;
        self.features_added += stats.added as u64;
        self.features_updated += stats.updated as u64;
        self.features_removed += stats.removed as u64;
        self.entities_excluded += stats.excluded as u64;
    }

    /// Fraction of incoming snapshots that were dropped as stale.
    pub fn stale_rate(&self) -> f64 {
        let total = self.passes_applied + self.stale_dropped;
        if total > 0 {
            self.stale_dropped as f64 / total as f64
        } else {
            0.0
        }
    }

    /// Average number of entities excluded per applied pass.
    pub fn avg_excluded(&self) -> f64 {
        if self.passes_applied > 0 {
            self.entities_excluded as f64 / self.passes_applied as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_accumulate() {
        let mut metrics = OverlayMetrics::default();
        metrics.record(&ReconcileStats { added: 3, excluded: 1, ..Default::default() });
        metrics.record(&ReconcileStats { updated: 2, unchanged: 1, removed: 1, excluded: 1, ..Default::default() });
        metrics.stale_dropped += 2;

        assert_eq!(metrics.passes_applied, 2);
        assert_eq!(metrics.features_added, 3);
        assert_eq!(metrics.features_removed, 1);
        assert!((metrics.stale_rate() - 0.5).abs() < 1e-12);
        assert!((metrics.avg_excluded() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_stats_helpers() {
        let stats = ReconcileStats { added: 1, updated: 2, unchanged: 3, removed: 0, excluded: 4 };
        assert_eq!(stats.rendered(), 6);
        assert!(!stats.is_noop());
        assert!(ReconcileStats { unchanged: 5, ..Default::default() }.is_noop());
    }
}
