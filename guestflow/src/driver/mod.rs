//! The page-driver capability surface consumed by the pipeline.
//!
//! The pipeline never talks to a browser directly; it sees only this trait.
//! [`cdp::ChromePage`] is the production implementation, driving Chrome over
//! its DevTools WebSocket. Tests use the scripted driver in
//! [`crate::testing`].

use async_trait::async_trait;
use std::time::Duration;

use crate::errors::DriverError;

pub mod cdp;

/// One rendered guest entry, snapshotted at query time.
///
/// The driver captures the display-name text and the profile href together so
/// the two cannot drift apart under re-rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedGuest {
    /// Display-name text of the entry.
    pub name_text: String,
    /// Profile href attribute; `None` when absent.
    pub href: Option<String>,
}

impl RenderedGuest {
    /// Creates a snapshot with an href.
    #[must_use]
    pub fn new(name_text: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            name_text: name_text.into(),
            href: Some(href.into()),
        }
    }

    /// Creates a snapshot with no href.
    #[must_use]
    pub fn without_href(name_text: impl Into<String>) -> Self {
        Self {
            name_text: name_text.into(),
            href: None,
        }
    }
}

/// Abstract browser-page capability.
///
/// One page, one authenticated context; callers are strictly sequential.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigates the page to a URL.
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    /// Waits until network activity has been quiet for the driver's idle
    /// window.
    async fn wait_for_network_idle(&self) -> Result<(), DriverError>;

    /// Returns the number of elements matching a selector.
    async fn count(&self, selector: &str) -> Result<usize, DriverError>;

    /// Returns the rendered text of every element matching a selector, in
    /// document order.
    async fn texts(&self, selector: &str) -> Result<Vec<String>, DriverError>;

    /// Returns an attribute of every element matching a selector, in
    /// document order. Missing attributes yield `None`.
    async fn attrs(&self, selector: &str, attribute: &str)
        -> Result<Vec<Option<String>>, DriverError>;

    /// Snapshots guest entries: for each element matching `selector`, the
    /// text of its `name_selector` descendant and its `href` attribute.
    async fn guest_entries(
        &self,
        selector: &str,
        name_selector: &str,
    ) -> Result<Vec<RenderedGuest>, DriverError>;

    /// Clicks the first element matching a selector.
    async fn click(&self, selector: &str) -> Result<(), DriverError>;

    /// Clicks the first element matching `selector` whose text contains every
    /// one of `substrings`.
    async fn click_containing(
        &self,
        selector: &str,
        substrings: &[String],
    ) -> Result<(), DriverError>;

    /// Fills the first element matching a selector with text.
    async fn fill(&self, selector: &str, text: &str) -> Result<(), DriverError>;

    /// Focuses the first element matching a selector and presses the End key,
    /// scrolling a focusable container to its bottom.
    async fn press_end(&self, selector: &str) -> Result<(), DriverError>;

    /// Waits until at least one element matches the selector, up to a
    /// timeout.
    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), DriverError>;

    /// Exports the browsing session (cookies) as an opaque bundle.
    async fn export_session(&self) -> Result<serde_json::Value, DriverError>;

    /// Restores a previously exported session bundle.
    async fn import_session(&self, bundle: &serde_json::Value) -> Result<(), DriverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rendered_guest_constructors() {
        let with_href = RenderedGuest::new("Jane Doe", "/user/usr-1");
        assert_eq!(with_href.href.as_deref(), Some("/user/usr-1"));

        let without = RenderedGuest::without_href("Jane Doe");
        assert!(without.href.is_none());
    }
}
