//! Alerting macros with `format!`-style arguments.
//!
//! Each macro takes the dispatcher first, then a format string and its
//! arguments, similar to `println!` and `format!`.
//!
//! # Examples
//!
//! ```
//! use slack_exception_logger::prelude::*;
//! use slack_exception_logger::{critical, info};
//!
//! let dispatcher = AlertDispatcher::builder()
//!     .config(DeliveryConfig::new("alerts", "xoxb-token"))
//!     .threshold(Severity::Emergency)
//!     .build()
//!     .unwrap();
//!
//! let port = 8080;
//! info!(dispatcher, "Server listening on port {}", port);
//!
//! let shard = 3;
//! critical!(dispatcher, "Shard {} lost quorum", shard);
//! assert_eq!(dispatcher.buffered_len(), 2);
//! ```

/// Log a message at an explicit severity.
///
/// # Examples
///
/// ```
/// # use slack_exception_logger::prelude::*;
/// # let dispatcher = AlertDispatcher::builder()
/// #     .config(DeliveryConfig::new("alerts", "xoxb-token"))
/// #     .build()
/// #     .unwrap();
/// use slack_exception_logger::log;
/// log!(dispatcher, Severity::Info, "Simple message");
/// log!(dispatcher, Severity::Debug, "Queue depth: {}", 12);
/// ```
#[macro_export]
macro_rules! log {
    ($dispatcher:expr, $severity:expr, $($arg:tt)+) => {
        $dispatcher.log($severity, format!($($arg)+))
    };
}

/// Log a debug-level message.
#[macro_export]
macro_rules! debug {
    ($dispatcher:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $crate::Severity::Debug, $($arg)+)
    };
}

/// Log a info-level message.
#[macro_export]
macro_rules! info {
    ($dispatcher:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $crate::Severity::Info, $($arg)+)
    };
}

/// Log a notice-level message.
#[macro_export]
macro_rules! notice {
    ($dispatcher:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $crate::Severity::Notice, $($arg)+)
    };
}

/// Log a warning-level message.
#[macro_export]
macro_rules! warning {
    ($dispatcher:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $crate::Severity::Warning, $($arg)+)
    };
}

/// Log a error-level message.
#[macro_export]
macro_rules! error {
    ($dispatcher:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $crate::Severity::Error, $($arg)+)
    };
}

/// Log a critical-level message.
#[macro_export]
macro_rules! critical {
    ($dispatcher:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $crate::Severity::Critical, $($arg)+)
    };
}

/// Log a alert-level message.
#[macro_export]
macro_rules! alert {
    ($dispatcher:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $crate::Severity::Alert, $($arg)+)
    };
}

/// Log a emergency-level message.
#[macro_export]
macro_rules! emergency {
    ($dispatcher:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $crate::Severity::Emergency, $($arg)+)
    };
}
