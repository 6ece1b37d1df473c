//! Log record structure

use super::fields::{FieldValue, Fields};
use super::severity::Severity;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Default channel name for records created without one
pub const DEFAULT_CHANNEL_NAME: &str = "app";

/// Error or panic details attached to a record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorInfo {
    /// Error type or origin, e.g. `panic` or a type name
    pub kind: String,
    pub message: String,
    /// `file:line` where the error was raised, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Captured backtrace text, rendered only when stack traces are enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backtrace: Option<String>,
}

impl ErrorInfo {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            location: None,
            backtrace: None,
        }
    }

    /// Capture details from any std error, walking its source chain
    pub fn from_error<E: std::error::Error>(err: &E) -> Self {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        let type_name = std::any::type_name::<E>();
        let kind = type_name.rsplit("::").next().unwrap_or(type_name);
        Self::new(kind, message)
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_backtrace(mut self, backtrace: impl Into<String>) -> Self {
        self.backtrace = Some(backtrace.into());
        self
    }

    /// One-line summary, e.g. `panic(boom) at src/main.rs:10`
    pub fn summary(&self) -> String {
        match &self.location {
            Some(location) => format!("{}({}) at {}", self.kind, self.message, location),
            None => format!("{}({})", self.kind, self.message),
        }
    }
}

/// A single log event
///
/// Built once per log call and handed to the dispatcher by value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub message: String,
    pub context: Fields,
    pub extra: Fields,
    pub channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl LogRecord {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            severity,
            message: message.into(),
            context: Fields::new(),
            extra: Fields::new(),
            channel: DEFAULT_CHANNEL_NAME.to_string(),
            error: None,
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn with_context(mut self, context: Fields) -> Self {
        self.context = context;
        self
    }

    pub fn with_context_field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.context.insert(key, value);
        self
    }

    pub fn with_extra(mut self, extra: Fields) -> Self {
        self.extra = extra;
        self
    }

    pub fn with_error(mut self, error: ErrorInfo) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
