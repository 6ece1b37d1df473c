//! Activation-gated dispatcher
//!
//! Records below the activation threshold are kept in a ring buffer and never
//! touch the network. The first record at or above the threshold activates
//! the dispatcher. That builds the delivery handler (once), sends the buffered
//! records oldest first, then the trigger itself. From then on, records pass
//! straight through to the handler.

use super::{
    buffer::{RingBuffer, DEFAULT_BUFFER_CAPACITY},
    config::{AlertConfig, DeliveryConfig},
    delivery::{DeliveryHandler, HandlerFactory},
    error::{AlertError, Result},
    fields::Fields,
    log_record::{ErrorInfo, LogRecord, DEFAULT_CHANNEL_NAME},
    metrics::DispatcherMetrics,
    processors::ProcessorRegistry,
    severity::Severity,
};
use crate::handlers::SlackHandler;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_DISPATCHER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    // Dispatchers currently handling a record on this thread
    static ACTIVE_DISPATCHERS: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

/// Marks a dispatcher as busy on the current thread until dropped
struct DispatchGuard {
    id: u64,
}

impl DispatchGuard {
    /// Returns `None` when the dispatcher is already busy on this thread
    fn enter(id: u64) -> Option<Self> {
        ACTIVE_DISPATCHERS.with(|active| {
            let mut active = active.borrow_mut();
            if active.contains(&id) {
                None
            } else {
                active.push(id);
                Some(DispatchGuard { id })
            }
        })
    }
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        ACTIVE_DISPATCHERS.with(|active| active.borrow_mut().retain(|id| *id != self.id));
    }
}

/// What happens to records arriving after activation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Passthrough {
    /// Deliver every record
    #[default]
    All,

    /// Deliver only records at or above the activation threshold
    AtOrAboveThreshold,
}

struct DispatcherState {
    activated: bool,
    buffer: RingBuffer,
    delivery: Option<Box<dyn DeliveryHandler>>,
}

pub struct AlertDispatcher {
    id: u64,
    threshold: Severity,
    passthrough: Passthrough,
    channel_name: String,
    config: DeliveryConfig,
    factory: Box<dyn HandlerFactory>,
    state: Mutex<DispatcherState>,
    metrics: Arc<DispatcherMetrics>,
}

impl AlertDispatcher {
    /// Create a builder for AlertDispatcher
    ///
    /// # Example
    /// ```
    /// use slack_exception_logger::prelude::*;
    ///
    /// let dispatcher = AlertDispatcher::builder()
    ///     .threshold(Severity::Warning)
    ///     .buffer_capacity(50)
    ///     .config(DeliveryConfig::new("alerts", "xoxb-token"))
    ///     .build()
    ///     .expect("valid dispatcher");
    ///
    /// dispatcher.info("cache warmed");
    /// assert!(!dispatcher.is_activated());
    /// assert_eq!(dispatcher.buffered_len(), 1);
    /// ```
    #[must_use]
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Build a dispatcher delivering to Slack from file configuration
    pub fn from_config(config: &AlertConfig) -> Result<Self> {
        Self::from_config_with_channel(config, None)
    }

    /// Like [`from_config`](Self::from_config), with an explicit channel
    /// taking precedence over the environment and `defaultChannel`
    pub fn from_config_with_channel(config: &AlertConfig, channel: Option<&str>) -> Result<Self> {
        Self::builder()
            .threshold(config.activation_severity()?)
            .buffer_capacity(config.buffer_size)
            .passthrough(config.passthrough)
            .config(config.resolve_with(channel, &ProcessorRegistry::with_builtins())?)
            .build()
    }

    /// Handle a record; failures are reported on stderr, never returned
    pub fn handle(&self, record: LogRecord) {
        if let Err(e) = self.try_handle(record) {
            report_failure(&e);
        }
    }

    /// Handle a record, returning delivery or activation failures
    pub fn try_handle(&self, record: LogRecord) -> Result<()> {
        let Some(_guard) = DispatchGuard::enter(self.id) else {
            self.metrics.record_reentrant_dropped();
            return Ok(());
        };

        let mut state = self.state.lock();

        if !state.activated {
            if record.severity < self.threshold {
                if state.buffer.record(record).is_some() {
                    self.metrics.record_evicted();
                }
                self.metrics.record_buffered();
                return Ok(());
            }
            return self.activate(&mut state, record);
        }

        if self.passthrough == Passthrough::AtOrAboveThreshold && record.severity < self.threshold {
            return Ok(());
        }

        match state.delivery.as_deref_mut() {
            Some(delivery) => self.deliver(delivery, &record),
            None => {
                self.metrics.record_dropped(1);
                Ok(())
            }
        }
    }

    /// Build the delivery handler and drain the buffer through it, then the trigger
    fn activate(&self, state: &mut DispatcherState, trigger: LogRecord) -> Result<()> {
        state.activated = true;
        self.metrics.record_activation();

        let backlog = state.buffer.drain();
        let total = backlog.len() + 1;

        let built = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.factory.build(&self.config)
        }))
        .unwrap_or_else(|panic_info| {
            Err(AlertError::config(
                "delivery handler",
                format!("factory panicked: {}", panic_message(panic_info.as_ref())),
            ))
        });

        let mut delivery = match built {
            Ok(delivery) => delivery,
            Err(e) => {
                self.metrics.record_dropped(total as u64);
                return Err(if e.is_config_error() {
                    e
                } else {
                    AlertError::config("delivery handler", e.to_string())
                });
            }
        };

        let pending = backlog.iter().chain(std::iter::once(&trigger));
        for (idx, record) in pending.enumerate() {
            if let Err(e) = self.deliver(delivery.as_mut(), record) {
                // Fail fast: whatever was still queued behind this record is lost
                self.metrics.record_dropped((total - idx - 1) as u64);
                state.delivery = Some(delivery);
                return Err(e);
            }
        }

        let flushed = delivery.flush();
        state.delivery = Some(delivery);
        flushed
    }

    /// Deliver one record, isolating handler panics
    fn deliver(&self, delivery: &mut dyn DeliveryHandler, record: &LogRecord) -> Result<()> {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            delivery.deliver(record)
        }));

        let result = match result {
            Ok(result) => result,
            Err(panic_info) => Err(AlertError::delivery_failed(format!(
                "{} handler panicked: {}",
                delivery.name(),
                panic_message(panic_info.as_ref())
            ))),
        };

        match result {
            Ok(()) => {
                self.metrics.record_delivered();
                Ok(())
            }
            Err(e) => {
                self.metrics.record_delivery_failure();
                Err(e)
            }
        }
    }

    pub fn log(&self, severity: Severity, message: impl Into<String>) {
        self.handle(self.new_record(severity, message));
    }

    /// Log with structured context fields
    pub fn log_with_context(&self, severity: Severity, message: impl Into<String>, context: Fields) {
        self.handle(self.new_record(severity, message).with_context(context));
    }

    /// Log an application error, keeping its source chain
    pub fn log_error<E: std::error::Error>(&self, severity: Severity, message: impl Into<String>, err: &E) {
        self.handle(
            self.new_record(severity, message)
                .with_error(ErrorInfo::from_error(err)),
        );
    }

    #[inline]
    pub fn debug(&self, message: impl Into<String>) {
        self.log(Severity::Debug, message);
    }

    #[inline]
    pub fn info(&self, message: impl Into<String>) {
        self.log(Severity::Info, message);
    }

    #[inline]
    pub fn notice(&self, message: impl Into<String>) {
        self.log(Severity::Notice, message);
    }

    #[inline]
    pub fn warning(&self, message: impl Into<String>) {
        self.log(Severity::Warning, message);
    }

    #[inline]
    pub fn error(&self, message: impl Into<String>) {
        self.log(Severity::Error, message);
    }

    #[inline]
    pub fn critical(&self, message: impl Into<String>) {
        self.log(Severity::Critical, message);
    }

    #[inline]
    pub fn alert(&self, message: impl Into<String>) {
        self.log(Severity::Alert, message);
    }

    #[inline]
    pub fn emergency(&self, message: impl Into<String>) {
        self.log(Severity::Emergency, message);
    }

    /// New record tagged with this dispatcher's channel name
    pub fn new_record(&self, severity: Severity, message: impl Into<String>) -> LogRecord {
        LogRecord::new(severity, message).with_channel(self.channel_name.as_str())
    }

    /// Flush the delivery handler, if one has been built
    pub fn flush(&self) -> Result<()> {
        let Some(_guard) = DispatchGuard::enter(self.id) else {
            return Ok(());
        };
        match self.state.lock().delivery.as_deref_mut() {
            Some(delivery) => delivery.flush(),
            None => Ok(()),
        }
    }

    pub fn is_activated(&self) -> bool {
        self.state.lock().activated
    }

    /// Number of records waiting for activation
    pub fn buffered_len(&self) -> usize {
        self.state.lock().buffer.len()
    }

    pub fn buffer_capacity(&self) -> usize {
        self.state.lock().buffer.capacity()
    }

    pub fn threshold(&self) -> Severity {
        self.threshold
    }

    pub fn passthrough(&self) -> Passthrough {
        self.passthrough
    }

    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    pub fn delivery_config(&self) -> &DeliveryConfig {
        &self.config
    }

    pub fn metrics(&self) -> &DispatcherMetrics {
        &self.metrics
    }

    /// Shared handle to the metrics, usable after the dispatcher is dropped
    pub fn metrics_handle(&self) -> Arc<DispatcherMetrics> {
        Arc::clone(&self.metrics)
    }
}

impl std::fmt::Debug for AlertDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertDispatcher")
            .field("id", &self.id)
            .field("threshold", &self.threshold)
            .field("passthrough", &self.passthrough)
            .field("channel_name", &self.channel_name)
            .finish_non_exhaustive()
    }
}

impl Drop for AlertDispatcher {
    fn drop(&mut self) {
        if let Some(delivery) = self.state.get_mut().delivery.as_mut() {
            if let Err(e) = delivery.flush() {
                eprintln!("[ALERT ERROR] Failed to flush {} handler during shutdown: {}", delivery.name(), e);
            }
        }

        let lost = self.metrics.dropped_count() + self.metrics.delivery_failures();
        if lost > 0 {
            eprintln!(
                "[ALERT WARNING] Exception logger shutting down with {} undelivered alerts (loss rate: {:.2}%)",
                lost,
                self.metrics.loss_rate()
            );
        }
    }
}

/// Report a failure through the fallback channel
fn report_failure(err: &AlertError) {
    if err.is_config_error() {
        eprintln!(
            "[ALERT FATAL] Delivery handler could not be built: {}. No alerts will be sent.",
            err
        );
    } else {
        eprintln!("[ALERT ERROR] Alert delivery failed: {}", err);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

fn slack_factory(config: &DeliveryConfig) -> Result<Box<dyn DeliveryHandler>> {
    Ok(Box::new(SlackHandler::new(config)?))
}

/// Builder for constructing AlertDispatcher with a fluent API
pub struct DispatcherBuilder {
    threshold: Severity,
    buffer_capacity: usize,
    passthrough: Passthrough,
    channel_name: String,
    config: Option<DeliveryConfig>,
    factory: Option<Box<dyn HandlerFactory>>,
}

impl DispatcherBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            threshold: Severity::Notice,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            passthrough: Passthrough::All,
            channel_name: DEFAULT_CHANNEL_NAME.to_string(),
            config: None,
            factory: None,
        }
    }

    /// Set the severity that activates delivery
    #[must_use = "builder methods return a new value"]
    pub fn threshold(mut self, threshold: Severity) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set how many records are kept before activation
    #[must_use = "builder methods return a new value"]
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn passthrough(mut self, passthrough: Passthrough) -> Self {
        self.passthrough = passthrough;
        self
    }

    /// Set the channel name stamped on records created by the dispatcher
    #[must_use = "builder methods return a new value"]
    pub fn channel_name(mut self, name: impl Into<String>) -> Self {
        self.channel_name = name.into();
        self
    }

    /// Set the resolved delivery configuration
    #[must_use = "builder methods return a new value"]
    pub fn config(mut self, config: DeliveryConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the Slack handler with a custom delivery handler factory
    #[must_use = "builder methods return a new value"]
    pub fn factory<F: HandlerFactory + 'static>(mut self, factory: F) -> Self {
        self.factory = Some(Box::new(factory));
        self
    }

    /// Build the AlertDispatcher
    pub fn build(self) -> Result<AlertDispatcher> {
        if self.buffer_capacity == 0 {
            return Err(AlertError::config("AlertDispatcher", "buffer capacity must be at least 1"));
        }
        let config = self.config.ok_or_else(|| {
            AlertError::config("AlertDispatcher", "a resolved delivery configuration is required")
        })?;
        let factory: Box<dyn HandlerFactory> = match self.factory {
            Some(factory) => factory,
            None => Box::new(slack_factory),
        };

        Ok(AlertDispatcher {
            id: NEXT_DISPATCHER_ID.fetch_add(1, Ordering::Relaxed),
            threshold: self.threshold,
            passthrough: self.passthrough,
            channel_name: self.channel_name,
            config,
            factory,
            state: Mutex::new(DispatcherState {
                activated: false,
                buffer: RingBuffer::new(self.buffer_capacity),
                delivery: None,
            }),
            metrics: Arc::new(DispatcherMetrics::new()),
        })
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
