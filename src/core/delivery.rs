//! Delivery handler trait and the factory that builds it on activation

use super::{config::DeliveryConfig, error::Result, log_record::LogRecord};

/// Destination for records once the dispatcher has activated.
///
/// A handler owns its connection; it is never shared between dispatchers.
pub trait DeliveryHandler: Send {
    fn deliver(&mut self, record: &LogRecord) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    fn name(&self) -> &str;
}

/// Builds the delivery handler from the resolved configuration.
///
/// Invoked by the dispatcher exactly once, at activation.
///
/// # Example
///
/// ```
/// use slack_exception_logger::core::{DeliveryConfig, DeliveryHandler, HandlerFactory, LogRecord, Result};
///
/// struct Discard;
///
/// impl DeliveryHandler for Discard {
///     fn deliver(&mut self, _record: &LogRecord) -> Result<()> { Ok(()) }
///     fn flush(&mut self) -> Result<()> { Ok(()) }
///     fn name(&self) -> &str { "discard" }
/// }
///
/// let factory = |_config: &DeliveryConfig| -> Result<Box<dyn DeliveryHandler>> {
///     Ok(Box::new(Discard))
/// };
/// let handler = factory.build(&DeliveryConfig::new("general", "xoxb-test")).unwrap();
/// assert_eq!(handler.name(), "discard");
/// ```
pub trait HandlerFactory: Send + Sync {
    fn build(&self, config: &DeliveryConfig) -> Result<Box<dyn DeliveryHandler>>;
}

impl<F> HandlerFactory for F
where
    F: Fn(&DeliveryConfig) -> Result<Box<dyn DeliveryHandler>> + Send + Sync,
{
    fn build(&self, config: &DeliveryConfig) -> Result<Box<dyn DeliveryHandler>> {
        self(config)
    }
}
