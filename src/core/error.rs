//! Error types for the exception logger

use std::time::Duration;

pub type Result<T> = std::result::Result<T, AlertError>;

#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    /// Invalid or incomplete configuration; fatal at setup or activation
    #[error("Invalid configuration for {component}: {message}")]
    Configuration { component: String, message: String },

    /// Destination did not answer within the configured bound
    #[error("Delivery to '{endpoint}' timed out after {timeout:?}")]
    DeliveryTimeout { endpoint: String, timeout: Duration },

    /// Destination was reachable but refused the message
    #[error("Delivery rejected ({status}): {reason}")]
    DeliveryRejected { status: u16, reason: String },

    /// Transport failure other than a timeout (refused connection, DNS, TLS)
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    /// YAML parse error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

impl AlertError {
    /// Create a configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        AlertError::Configuration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a delivery timeout error
    pub fn timeout(endpoint: impl Into<String>, timeout: Duration) -> Self {
        AlertError::DeliveryTimeout {
            endpoint: endpoint.into(),
            timeout,
        }
    }

    /// Create a delivery rejected error
    pub fn rejected(status: u16, reason: impl Into<String>) -> Self {
        AlertError::DeliveryRejected {
            status,
            reason: reason.into(),
        }
    }

    /// Create a transport failure error
    pub fn delivery_failed<S: Into<String>>(msg: S) -> Self {
        AlertError::DeliveryFailed(msg.into())
    }

    /// Whether this error must abort sink setup
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            AlertError::Configuration { .. } | AlertError::YamlError(_)
        )
    }

    /// Whether this error only affects a single delivery
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AlertError::DeliveryTimeout { .. }
                | AlertError::DeliveryRejected { .. }
                | AlertError::DeliveryFailed(_)
        )
    }
}
