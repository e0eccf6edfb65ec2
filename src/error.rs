//! Error types and handling for the weather relay

use thiserror::Error;

/// Main error type for the weather relay
#[derive(Error, Debug)]
pub enum RelayError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Transport failures talking to an upstream service
    #[error("Network error calling {service}: {message}")]
    Network {
        service: &'static str,
        message: String,
    },

    /// Upstream service answered with a non-success status
    #[error("{service} service returned HTTP {status}")]
    Upstream { service: &'static str, status: u16 },

    /// Upstream body could not be decoded
    #[error("Invalid response from {service}: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// Persistence store errors
    #[error("Store error: {message}")]
    Store { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl RelayError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new transport error for `service`
    pub fn network<S: Into<String>>(service: &'static str, message: S) -> Self {
        Self::Network {
            service,
            message: message.into(),
        }
    }

    pub fn upstream(service: &'static str, status: u16) -> Self {
        Self::Upstream { service, status }
    }

    pub fn invalid_response<S: Into<String>>(service: &'static str, message: S) -> Self {
        Self::InvalidResponse {
            service,
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new store error
    pub fn store<S: Into<String>>(message: S) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Machine-readable error kind, used in JSON error bodies
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::Config { .. } => "config",
            RelayError::Network { .. } => "network",
            RelayError::Upstream { .. } => "upstream",
            RelayError::InvalidResponse { .. } => "invalid_response",
            RelayError::Validation { .. } => "validation",
            RelayError::Store { .. } => "store",
            RelayError::Io { .. } => "io",
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            RelayError::Config { .. } => {
                "Configuration error. Please check the relay configuration.".to_string()
            }
            RelayError::Network { .. } => {
                "Unable to reach the weather service. Please try again later.".to_string()
            }
            RelayError::Upstream { status, .. } => {
                format!("The weather service is unavailable (HTTP {status}).")
            }
            RelayError::InvalidResponse { .. } => {
                "The weather service sent data that could not be read.".to_string()
            }
            RelayError::Validation { message } => format!("Invalid input: {message}"),
            RelayError::Store { .. } => "Reading stored weather data failed.".to_string(),
            RelayError::Io { .. } => "File operation failed. Please check file permissions.".to_string(),
        }
    }
}

impl From<fjall::Error> for RelayError {
    fn from(err: fjall::Error) -> Self {
        RelayError::store(err.to_string())
    }
}
