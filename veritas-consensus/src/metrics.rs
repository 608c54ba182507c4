//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `veritas_transactions_submitted_total` - Transactions accepted for voting
//! - `veritas_transactions_committed_total` - Transactions committed
//! - `veritas_transactions_rejected_total` - Transactions rejected
//! - `veritas_rounds_total` - Voting rounds opened
//! - `veritas_round_duration_seconds` - Histogram of round durations
//! - `veritas_committed_order` - Order index of the last commit

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Registry};
use std::sync::Arc;

/// Metrics collector
///
/// Registers against its own registry so multiple service instances can
/// coexist in one process.
#[derive(Clone)]
pub struct Metrics {
    /// Transactions accepted for voting
    pub transactions_submitted: IntCounter,

    /// Transactions committed
    pub transactions_committed: IntCounter,

    /// Transactions rejected
    pub transactions_rejected: IntCounter,

    /// Voting rounds opened
    pub rounds_total: IntCounter,

    /// Round duration histogram
    pub round_duration: Histogram,

    /// Order index of the last commit
    pub committed_order: IntGauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let transactions_submitted = IntCounter::new(
            "veritas_transactions_submitted_total",
            "Transactions accepted for voting",
        )?;
        registry.register(Box::new(transactions_submitted.clone()))?;

        let transactions_committed = IntCounter::new(
            "veritas_transactions_committed_total",
            "Transactions committed",
        )?;
        registry.register(Box::new(transactions_committed.clone()))?;

        let transactions_rejected = IntCounter::new(
            "veritas_transactions_rejected_total",
            "Transactions rejected",
        )?;
        registry.register(Box::new(transactions_rejected.clone()))?;

        let rounds_total = IntCounter::new("veritas_rounds_total", "Voting rounds opened")?;
        registry.register(Box::new(rounds_total.clone()))?;

        let round_duration = Histogram::with_opts(
            HistogramOpts::new("veritas_round_duration_seconds", "Round durations").buckets(vec![
                0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5,
            ]),
        )?;
        registry.register(Box::new(round_duration.clone()))?;

        let committed_order =
            IntGauge::new("veritas_committed_order", "Order index of the last commit")?;
        registry.register(Box::new(committed_order.clone()))?;

        Ok(Self {
            transactions_submitted,
            transactions_committed,
            transactions_rejected,
            rounds_total,
            round_duration,
            committed_order,
            registry,
        })
    }
}
