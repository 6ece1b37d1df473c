//! # Slack Exception Logger
//!
//! Activation-gated alerting to Slack. Records are kept in memory until one
//! reaches the activation severity. That record opens the connection and
//! sends the buffered lead-up followed by itself.
//!
//! ## Features
//!
//! - **Quiet by default**: no network traffic until something goes wrong
//! - **Context preserving**: the last N records before the trigger are sent with it
//! - **Bounded**: fixed-size buffer, bounded connect and request timeouts
//! - **Process-wide**: optional panic hook and `log` facade bridge
//!
//! ## Example
//!
//! ```
//! use slack_exception_logger::prelude::*;
//!
//! let dispatcher = AlertDispatcher::builder()
//!     .threshold(Severity::Error)
//!     .config(DeliveryConfig::new("alerts", "xoxb-token"))
//!     .build()
//!     .expect("valid dispatcher");
//!
//! dispatcher.info("request accepted");
//! assert!(!dispatcher.is_activated());
//! ```

pub mod core;
pub mod handlers;
pub mod hooks;
pub mod macros;

pub mod prelude {
    pub use crate::core::{
        AlertConfig, AlertDispatcher, AlertError, DeliveryConfig, DeliveryHandler,
        DispatcherBuilder, DispatcherMetrics, ErrorInfo, FieldValue, Fields, HandlerFactory,
        LineFormatter, LogRecord, Passthrough, Result, Severity,
    };
    pub use crate::handlers::SlackHandler;
}

pub use crate::core::{
    AlertConfig, AlertDispatcher, AlertError, DateFormat, DeliveryConfig, DeliveryHandler,
    DispatcherBuilder, DispatcherMetrics, ErrorInfo, FieldValue, Fields, HandlerFactory,
    LineFormatter, LogRecord, Passthrough, Processor, ProcessorRegistry, Result, Severity,
    Timezone,
};
pub use handlers::SlackHandler;
pub use hooks::{install_panic_hook, setup_exception_logger};
#[cfg(feature = "log-bridge")]
pub use hooks::{install_log_bridge, LogBridge};
