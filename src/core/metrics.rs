//! Dispatcher metrics for observability
//!
//! Counters describing what happened to each record handed to a dispatcher:
//! buffered, evicted, delivered or dropped.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for dispatcher observability
///
/// # Example
///
/// ```
/// use slack_exception_logger::DispatcherMetrics;
///
/// let metrics = DispatcherMetrics::new();
///
/// metrics.record_delivered();
/// metrics.record_delivery_failure();
///
/// assert_eq!(metrics.delivered_count(), 1);
/// assert_eq!(metrics.delivery_failures(), 1);
/// ```
#[derive(Debug, Default)]
pub struct DispatcherMetrics {
    /// Records held in the ring buffer while dormant
    buffered: AtomicU64,

    /// Records pushed out of a full ring buffer
    evicted: AtomicU64,

    /// Records accepted by the delivery handler
    delivered: AtomicU64,

    /// Records lost after activation (failed drain, missing handler)
    dropped: AtomicU64,

    /// Individual delivery calls that returned an error
    delivery_failures: AtomicU64,

    /// Dormant to activated transitions; never more than one
    activations: AtomicU64,

    /// Records ignored because they were raised from inside the dispatcher
    reentrant_dropped: AtomicU64,
}

impl DispatcherMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            buffered: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            delivery_failures: AtomicU64::new(0),
            activations: AtomicU64::new(0),
            reentrant_dropped: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn buffered_count(&self) -> u64 {
        self.buffered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn evicted_count(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn delivered_count(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn delivery_failures(&self) -> u64 {
        self.delivery_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn activations(&self) -> u64 {
        self.activations.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn reentrant_dropped(&self) -> u64 {
        self.reentrant_dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_buffered(&self) -> u64 {
        self.buffered.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_evicted(&self) -> u64 {
        self.evicted.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_delivered(&self) -> u64 {
        self.delivered.fetch_add(1, Ordering::Relaxed)
    }

    /// Record `count` records lost at once
    #[inline]
    pub fn record_dropped(&self, count: u64) -> u64 {
        self.dropped.fetch_add(count, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_delivery_failure(&self) -> u64 {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_activation(&self) -> u64 {
        self.activations.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_reentrant_dropped(&self) -> u64 {
        self.reentrant_dropped.fetch_add(1, Ordering::Relaxed)
    }

    /// Share of post-activation records that never reached the destination,
    /// as a percentage (0.0 - 100.0)
    pub fn loss_rate(&self) -> f64 {
        let delivered = self.delivered_count();
        let lost = self.dropped_count() + self.delivery_failures();
        let total = delivered + lost;
        if total == 0 {
            0.0
        } else {
            (lost as f64 / total as f64) * 100.0
        }
    }
}
