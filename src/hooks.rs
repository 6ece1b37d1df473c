//! Process-wide installation
//!
//! A dispatcher is an ordinary value, but a process usually wants two global
//! entry points feeding it: the panic hook and the `log` facade. Both are
//! one-time registrations holding an `Arc` to the dispatcher.

use crate::core::{AlertConfig, AlertDispatcher, ErrorInfo, LogRecord, Result, Severity};
use std::any::Any;
use std::backtrace::Backtrace;
use std::path::Path;
use std::sync::Arc;

/// Route panics to the dispatcher as CRITICAL records.
///
/// The previously installed hook still runs afterwards, so the default
/// "thread panicked at" message is kept.
pub fn install_panic_hook(dispatcher: Arc<AlertDispatcher>) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let message = panic_message(info.payload());
        let mut error = ErrorInfo::new("panic", message.clone())
            .with_backtrace(Backtrace::force_capture().to_string());
        if let Some(location) = info.location() {
            error = error.with_location(location.to_string());
        }

        dispatcher.handle(
            dispatcher
                .new_record(Severity::Critical, format!("Uncaught panic: {}", message))
                .with_error(error),
        );

        previous(info);
    }));
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

#[cfg(feature = "log-bridge")]
pub use bridge::{install_log_bridge, LogBridge};

#[cfg(feature = "log-bridge")]
mod bridge {
    use super::*;
    use crate::core::AlertError;
    use log::{Level, LevelFilter, Metadata, Record};

    // Our own HTTP stack logs from its runtime thread while delivering.
    // Forwarding those records would feed every delivery back into the
    // dispatcher.
    const IGNORED_TARGETS: &[&str] = &[
        "slack_exception_logger",
        "reqwest",
        "hyper",
        "hyper_util",
        "h2",
        "rustls",
        "tokio",
        "mio",
        "want",
    ];

    /// `log` facade implementation feeding an [`AlertDispatcher`]
    pub struct LogBridge {
        dispatcher: Arc<AlertDispatcher>,
        max_level: LevelFilter,
    }

    impl LogBridge {
        pub fn new(dispatcher: Arc<AlertDispatcher>, max_level: LevelFilter) -> Self {
            Self {
                dispatcher,
                max_level,
            }
        }

        /// Severity a `log` level maps to
        pub fn severity_for(level: Level) -> Severity {
            match level {
                Level::Error => Severity::Error,
                Level::Warn => Severity::Warning,
                Level::Info => Severity::Info,
                Level::Debug | Level::Trace => Severity::Debug,
            }
        }

        pub(crate) fn is_ignored(target: &str) -> bool {
            IGNORED_TARGETS.iter().any(|ignored| {
                target == *ignored
                    || target
                        .strip_prefix(ignored)
                        .is_some_and(|rest| rest.starts_with("::"))
            })
        }

        /// Convert a `log` record without dispatching it
        pub fn to_record(&self, record: &Record<'_>) -> LogRecord {
            self.dispatcher
                .new_record(Self::severity_for(record.level()), record.args().to_string())
                .with_context_field("target", record.target())
        }
    }

    impl log::Log for LogBridge {
        fn enabled(&self, metadata: &Metadata<'_>) -> bool {
            metadata.level() <= self.max_level && !Self::is_ignored(metadata.target())
        }

        fn log(&self, record: &Record<'_>) {
            if self.enabled(record.metadata()) {
                self.dispatcher.handle(self.to_record(record));
            }
        }

        fn flush(&self) {
            if let Err(e) = self.dispatcher.flush() {
                eprintln!("[ALERT ERROR] Failed to flush alert dispatcher: {}", e);
            }
        }
    }

    /// Register the dispatcher as the global `log` logger.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a global logger is already set
    pub fn install_log_bridge(dispatcher: Arc<AlertDispatcher>, max_level: LevelFilter) -> Result<()> {
        log::set_boxed_logger(Box::new(LogBridge::new(dispatcher, max_level))).map_err(|e| {
            AlertError::config("log-bridge", format!("global logger already set: {}", e))
        })?;
        log::set_max_level(max_level);
        Ok(())
    }
}

/// Load a config file, build a dispatcher and install it process-wide.
///
/// `activation_level` overrides the `activationLevel` key when given, and
/// `channel` takes precedence over the channel environment variable and
/// `defaultChannel`. Configuration problems are returned before anything is
/// installed.
///
/// # Example
///
/// ```no_run
/// use slack_exception_logger::hooks::setup_exception_logger;
/// use slack_exception_logger::Severity;
///
/// let dispatcher = match setup_exception_logger("alerting.yaml", Some(Severity::Error), None) {
///     Ok(dispatcher) => dispatcher,
///     Err(e) => {
///         eprintln!("alerting disabled: {}", e);
///         return;
///     }
/// };
///
/// dispatcher.info("service started");
/// ```
pub fn setup_exception_logger<P: AsRef<Path>>(
    path: P,
    activation_level: Option<Severity>,
    channel: Option<&str>,
) -> Result<Arc<AlertDispatcher>> {
    let mut config = AlertConfig::load_from_file(path)?;
    if let Some(level) = activation_level {
        config.activation_level = level.to_string();
    }

    let dispatcher = Arc::new(AlertDispatcher::from_config_with_channel(&config, channel)?);

    #[cfg(feature = "log-bridge")]
    bridge::install_log_bridge(Arc::clone(&dispatcher), log::LevelFilter::Trace)?;

    install_panic_hook(Arc::clone(&dispatcher));
    Ok(dispatcher)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_payloads() {
        let boxed: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(boxed.as_ref()), "static str");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");

        let boxed: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(boxed.as_ref()), "Box<dyn Any>");
    }

    #[cfg(feature = "log-bridge")]
    #[test]
    fn test_level_mapping() {
        use log::Level;
        assert_eq!(LogBridge::severity_for(Level::Error), Severity::Error);
        assert_eq!(LogBridge::severity_for(Level::Warn), Severity::Warning);
        assert_eq!(LogBridge::severity_for(Level::Info), Severity::Info);
        assert_eq!(LogBridge::severity_for(Level::Debug), Severity::Debug);
        assert_eq!(LogBridge::severity_for(Level::Trace), Severity::Debug);
    }

    #[cfg(feature = "log-bridge")]
    #[test]
    fn test_transport_targets_are_ignored() {
        assert!(LogBridge::is_ignored("hyper"));
        assert!(LogBridge::is_ignored("hyper_util::client::legacy"));
        assert!(LogBridge::is_ignored("reqwest::connect"));
        assert!(!LogBridge::is_ignored("hyperion"));
        assert!(!LogBridge::is_ignored("my_app::db"));
    }

    #[test]
    fn test_setup_rejects_missing_file() {
        let err = setup_exception_logger("/nonexistent/alerting.yaml", None, None)
            .err()
            .expect("missing file");
        assert!(err.is_config_error());
    }
}
