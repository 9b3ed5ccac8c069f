//! Error types for the guestflow pipeline.
//!
//! Expected absences (a guest without a LinkedIn link, a name without a last
//! part) are not errors and never appear here; they are handled by skipping
//! the field or the row. These types cover environment failures and the
//! explicit outcomes of the run.

use std::time::Duration;
use thiserror::Error;

/// The main error type for guestflow operations.
#[derive(Debug, Error)]
pub enum GuestflowError {
    /// A page-driver operation failed.
    #[error("{0}")]
    Driver(#[from] DriverError),

    /// The login flow could not complete.
    #[error("Login failed: {0}")]
    Login(String),

    /// The persisted session bundle could not be read or written.
    #[error("Session store error: {0}")]
    SessionStore(String),

    /// The run was cancelled.
    #[error("Run cancelled: {0}")]
    Cancelled(String),

    /// A required element of the event page was missing.
    #[error("Event page element missing: {0}")]
    MissingElement(String),

    /// Configuration is unusable (bad pattern, bad path).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by a [`PageDriver`](crate::driver::PageDriver) implementation.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The WebSocket connection to the browser could not be established.
    #[error("Failed to connect to browser at {url}: {detail}")]
    Connect {
        /// The DevTools endpoint URL.
        url: String,
        /// The underlying failure.
        detail: String,
    },

    /// Navigation to a URL failed at the browser level.
    #[error("Navigation to {url} failed: {reason}")]
    NavigationFailed {
        /// The target URL.
        url: String,
        /// The browser-reported reason.
        reason: String,
    },

    /// No element matched a selector that the flow requires.
    #[error("Element not found: {selector}")]
    ElementNotFound {
        /// The CSS selector that matched nothing.
        selector: String,
    },

    /// A wait for a selector or page state exceeded its timeout.
    #[error("Timed out after {timeout:?} waiting for {what}")]
    Timeout {
        /// What was being waited for.
        what: String,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// A script evaluated in the page threw an exception.
    #[error("Script exception: {message}")]
    ScriptException {
        /// The exception description.
        message: String,
    },

    /// The protocol connection returned something unexpected.
    #[error("Protocol error: {detail}")]
    Protocol {
        /// Details of the violation.
        detail: String,
    },
}

impl DriverError {
    /// Creates a connect error.
    #[must_use]
    pub fn connect(url: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Connect {
            url: url.into(),
            detail: detail.into(),
        }
    }

    /// Creates a navigation failure.
    #[must_use]
    pub fn navigation(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NavigationFailed {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates an element-not-found error.
    #[must_use]
    pub fn not_found(selector: impl Into<String>) -> Self {
        Self::ElementNotFound {
            selector: selector.into(),
        }
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(what: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            what: what.into(),
            timeout,
        }
    }

    /// Creates a protocol error.
    #[must_use]
    pub fn protocol(detail: impl Into<String>) -> Self {
        Self::Protocol {
            detail: detail.into(),
        }
    }
}
