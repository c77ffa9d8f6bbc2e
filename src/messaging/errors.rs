//! # Messaging Error Types
//!
//! Structured error handling for the ingestion pipeline using thiserror.
//! Transient broker failures are absorbed by the reconnect loop and never
//! surface to callers; the variants here cover what remains.

use thiserror::Error;

/// Comprehensive messaging error types
#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Broker connection error: {message}")]
    Connection { message: String },

    #[error("Channel error: {message}")]
    Channel { message: String },

    #[error("Topology declaration failed: {name}: {message}")]
    Topology { name: String, message: String },

    #[error("Consume setup failed for queue {queue}: {message}")]
    Consume { queue: String, message: String },

    #[error("Payload decode error on {routing_key}: {message}")]
    Decode {
        routing_key: String,
        message: String,
    },

    #[error("Unrecognized routing key: {routing_key}")]
    UnknownRoutingKey { routing_key: String },

    #[error("Acknowledgement failed: {message}")]
    Acknowledge { message: String },

    #[error("Pipeline is shutting down")]
    ShutdownInProgress,

    #[error("Configuration error: {component}: {message}")]
    Configuration { component: String, message: String },

    #[error("Internal messaging error: {message}")]
    Internal { message: String },
}

impl MessagingError {
    /// Create a broker connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a channel error
    pub fn channel(message: impl Into<String>) -> Self {
        Self::Channel {
            message: message.into(),
        }
    }

    /// Create a topology declaration error
    pub fn topology(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Topology {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a consume setup error
    pub fn consume(queue: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Consume {
            queue: queue.into(),
            message: message.into(),
        }
    }

    /// Create a payload decode error
    pub fn decode(routing_key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            routing_key: routing_key.into(),
            message: message.into(),
        }
    }

    /// Create an unknown routing key error
    pub fn unknown_routing_key(routing_key: impl Into<String>) -> Self {
        Self::UnknownRoutingKey {
            routing_key: routing_key.into(),
        }
    }

    /// Create an acknowledgement error
    pub fn acknowledge(message: impl Into<String>) -> Self {
        Self::Acknowledge {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Conversion from lapin::Error to MessagingError
impl From<lapin::Error> for MessagingError {
    fn from(err: lapin::Error) -> Self {
        MessagingError::connection(err.to_string())
    }
}

/// Conversion from serde_json::Error to MessagingError
impl From<serde_json::Error> for MessagingError {
    fn from(err: serde_json::Error) -> Self {
        MessagingError::decode("unknown", err.to_string())
    }
}

/// Result type alias for messaging operations
pub type MessagingResult<T> = Result<T, MessagingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messaging_error_creation() {
        let conn_err = MessagingError::connection("Connection refused");
        assert!(matches!(conn_err, MessagingError::Connection { .. }));

        let topo_err = MessagingError::topology("lobby.account.created", "declare failed");
        assert!(matches!(topo_err, MessagingError::Topology { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = MessagingError::decode("account.created", "missing field `id`");
        let rendered = format!("{err}");
        assert!(rendered.contains("account.created"));
        assert!(rendered.contains("missing field"));

        let err = MessagingError::unknown_routing_key("account.exploded");
        assert!(format!("{err}").contains("account.exploded"));
    }

    #[test]
    fn test_serde_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{broken").unwrap_err();
        let err: MessagingError = json_err.into();
        assert!(matches!(err, MessagingError::Decode { .. }));
    }
}
