//! Error handling for envdash-rs
//!
//! This module defines the error type shared by the ingestion core and a
//! Result alias for use throughout the crate.
//!
//! Construction-time errors (duplicate topics, zero capacity, bad channel
//! definitions) are fatal and surface from constructors. Per-message problems
//! are never errors: they are reported as [`crate::types::IngestResult`]
//! values, and connectivity problems travel as
//! [`crate::transport::TransportEvent`]s.

use thiserror::Error;

/// Main error type for envdash-rs operations
#[derive(Error, Debug)]
pub enum EnvDashError {
    /// Two channels are bound to the same wire topic
    #[error("Duplicate topic mapping: '{topic}' is bound to both '{first}' and '{second}'")]
    DuplicateTopicMapping {
        topic: String,
        first: String,
        second: String,
    },

    /// Two channels share the same logical key
    #[error("Duplicate channel key: '{0}'")]
    DuplicateChannelKey(String),

    /// A channel definition is internally inconsistent
    #[error("Invalid channel '{key}': {message}")]
    InvalidChannel { key: String, message: String },

    /// A history buffer was configured with a capacity of zero
    #[error("History buffer capacity must be greater than zero (got {0})")]
    BufferCapacityMisconfigured(usize),

    /// A non-numeric sample was offered to a chart history
    #[error("Channel '{0}' only accepts numeric samples")]
    NonNumericSample(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to the broker transport
    #[error("Transport error: {0}")]
    Transport(String),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<EnvDashError>,
    },
}

impl EnvDashError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        EnvDashError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error can only happen while building the dashboard
    pub fn is_construction_error(&self) -> bool {
        match self {
            EnvDashError::DuplicateTopicMapping { .. }
            | EnvDashError::DuplicateChannelKey(_)
            | EnvDashError::InvalidChannel { .. }
            | EnvDashError::BufferCapacityMisconfigured(_)
            | EnvDashError::Config(_) => true,
            EnvDashError::WithContext { source, .. } => source.is_construction_error(),
            _ => false,
        }
    }
}

impl From<toml::de::Error> for EnvDashError {
    fn from(err: toml::de::Error) -> Self {
        EnvDashError::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for EnvDashError {
    fn from(err: toml::ser::Error) -> Self {
        EnvDashError::Serialization(err.to_string())
    }
}

/// Result type alias for envdash-rs operations
pub type Result<T> = std::result::Result<T, EnvDashError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
