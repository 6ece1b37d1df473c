//! Core alerting types and traits

pub mod buffer;
pub mod config;
pub mod delivery;
pub mod dispatcher;
pub mod error;
pub mod fields;
pub mod formatter;
pub mod log_record;
pub mod metrics;
pub mod processors;
pub mod severity;

pub use buffer::{RingBuffer, DEFAULT_BUFFER_CAPACITY};
pub use config::{AlertConfig, DeliveryConfig, DEFAULT_API_URL, DEFAULT_TIMEOUT, FALLBACK_CHANNEL};
pub use delivery::{DeliveryHandler, HandlerFactory};
pub use dispatcher::{AlertDispatcher, DispatcherBuilder, Passthrough};
pub use error::{AlertError, Result};
pub use fields::{FieldValue, Fields};
pub use formatter::{
    DateFormat, LineFormatter, Timezone, DEFAULT_DATE_FORMAT, DEFAULT_MESSAGE_FORMAT,
};
pub use log_record::{ErrorInfo, LogRecord, DEFAULT_CHANNEL_NAME};
pub use metrics::DispatcherMetrics;
pub use processors::{Processor, ProcessorRegistry, ResolvedProcessor};
pub use severity::Severity;
