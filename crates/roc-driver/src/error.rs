//! Error types for readout card operations

use crate::parameters::PciAddress;
use thiserror::Error;

/// Result type alias for readout card operations
pub type Result<T> = std::result::Result<T, RocError>;

/// Errors that can occur during readout card operations
#[derive(Debug, Error)]
pub enum RocError {
    /// A required parameter is absent, or a present value is structurally invalid
    #[error("Configuration error for {key}: {reason}")]
    Configuration {
        /// Parameter key
        key: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// Malformed input string
    #[error("Failed to parse {input:?}: {reason}")]
    Parse {
        /// The offending string
        input: String,
        /// Reason for failure
        reason: String,
    },

    /// No installed card matches the search target
    #[error("Could not find card: {target}")]
    NotFound {
        /// What was searched for
        target: SearchTarget,
    },

    /// Operation requires a BAR the current window is not bound to
    #[error("Invalid BAR access: {message} (expected BAR {expected}, bound to BAR {actual})")]
    InvalidAccess {
        /// BAR the operation requires
        expected: usize,
        /// BAR the window is bound to
        actual: usize,
        /// Which operation was attempted
        message: String,
    },

    /// A bounded busy-wait exceeded its iteration budget
    #[error("Timeout in {operation} after {iterations} polls")]
    Timeout {
        /// What was being waited on
        operation: &'static str,
        /// Polls performed
        iterations: u32,
    },

    /// The SCA reported error flags in a response
    #[error("SCA error code {code:#x}: {}", .flags.join(", "))]
    Protocol {
        /// Low byte of the response command word
        code: u32,
        /// Decoded flag names, ascending bit order
        flags: Vec<&'static str>,
    },

    /// The raw PCI layer failed (device listing, topology read, BAR mapping)
    #[error("PCI access failed: {reason}")]
    Pci {
        /// Reason for failure
        reason: String,
    },

    /// I/O error during device communication
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

/// Card search key carried by [`RocError::NotFound`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchTarget {
    /// Serial number searched for
    Serial(i32),
    /// PCI address searched for
    Address(PciAddress),
}

impl std::fmt::Display for SearchTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serial(serial) => write!(f, "serial number {serial}"),
            Self::Address(address) => write!(f, "PCI address {address}"),
        }
    }
}

impl RocError {
    /// Create a configuration error
    pub fn configuration(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Configuration {
            key,
            reason: reason.into(),
        }
    }

    /// Create a configuration error for an absent required parameter
    pub fn missing_parameter(key: &'static str) -> Self {
        Self::configuration(key, "required parameter was not set")
    }

    /// Create a parse error
    pub fn parse(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a PCI access error
    pub fn pci(reason: impl Into<String>) -> Self {
        Self::Pci {
            reason: reason.into(),
        }
    }

    /// Create an invalid access error
    pub fn invalid_access(expected: usize, actual: usize, message: impl Into<String>) -> Self {
        Self::InvalidAccess {
            expected,
            actual,
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub const fn timeout(operation: &'static str, iterations: u32) -> Self {
        Self::Timeout {
            operation,
            iterations,
        }
    }

    /// Parameter key of a configuration error
    pub fn key(&self) -> Option<&'static str> {
        match self {
            Self::Configuration { key, .. } => Some(*key),
            _ => None,
        }
    }
}
