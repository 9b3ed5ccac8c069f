//! Scripted page driver for tests.
//!
//! [`ScriptedPage`] plays back configured responses and records every
//! interaction, so pipeline logic can be exercised without a browser. It is
//! compiled into the library (not gated) so integration tests and downstream
//! users can drive the pipeline headlessly.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::driver::{PageDriver, RenderedGuest};
use crate::errors::DriverError;

/// A playback [`PageDriver`] with call recording.
///
/// Counts for a selector are consumed one per call, with the final value
/// repeating; everything else is keyed lookup with empty-set fallbacks.
#[derive(Default)]
pub struct ScriptedPage {
    texts: Mutex<HashMap<String, Vec<String>>>,
    counts: Mutex<HashMap<String, VecDeque<usize>>>,
    guests: Mutex<Vec<RenderedGuest>>,
    profile_links: Mutex<HashMap<String, Vec<Option<String>>>>,
    session_bundle: Mutex<Option<Value>>,
    missing_selectors: Mutex<Vec<String>>,

    navigations: Mutex<Vec<String>>,
    current_url: Mutex<String>,
    clicks: Mutex<Vec<String>>,
    fills: Mutex<Vec<(String, String)>>,
    end_presses: Mutex<usize>,
    imported_bundles: Mutex<Vec<Value>>,
}

impl ScriptedPage {
    /// Creates an empty scripted page.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the rendered texts of a selector.
    #[must_use]
    pub fn with_texts(self, selector: impl Into<String>, texts: Vec<&str>) -> Self {
        self.texts
            .lock()
            .insert(selector.into(), texts.into_iter().map(String::from).collect());
        self
    }

    /// Scripts a sequence of counts for a selector; the last value repeats.
    #[must_use]
    pub fn with_count_sequence(self, selector: impl Into<String>, counts: Vec<usize>) -> Self {
        self.counts.lock().insert(selector.into(), counts.into());
        self
    }

    /// Scripts the guest entries returned by `guest_entries`.
    #[must_use]
    pub fn with_guests(self, guests: Vec<RenderedGuest>) -> Self {
        *self.guests.lock() = guests;
        self
    }

    /// Scripts the social-link hrefs visible after navigating to `url`.
    #[must_use]
    pub fn with_profile_links(self, url: impl Into<String>, hrefs: Vec<Option<&str>>) -> Self {
        self.profile_links.lock().insert(
            url.into(),
            hrefs.into_iter().map(|h| h.map(String::from)).collect(),
        );
        self
    }

    /// Scripts the session bundle returned by `export_session`.
    #[must_use]
    pub fn with_session_bundle(self, bundle: Value) -> Self {
        *self.session_bundle.lock() = Some(bundle);
        self
    }

    /// Makes `wait_for_selector` time out for a selector.
    #[must_use]
    pub fn with_missing_selector(self, selector: impl Into<String>) -> Self {
        self.missing_selectors.lock().push(selector.into());
        self
    }

    /// URLs navigated to, in order.
    #[must_use]
    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().clone()
    }

    /// Selectors clicked, in order.
    #[must_use]
    pub fn clicks(&self) -> Vec<String> {
        self.clicks.lock().clone()
    }

    /// (selector, text) pairs filled, in order.
    #[must_use]
    pub fn fills(&self) -> Vec<(String, String)> {
        self.fills.lock().clone()
    }

    /// Number of End-key presses issued.
    #[must_use]
    pub fn end_presses(&self) -> usize {
        *self.end_presses.lock()
    }

    /// Session bundles imported, in order.
    #[must_use]
    pub fn imported_bundles(&self) -> Vec<Value> {
        self.imported_bundles.lock().clone()
    }
}

#[async_trait]
impl PageDriver for ScriptedPage {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.navigations.lock().push(url.to_string());
        *self.current_url.lock() = url.to_string();
        Ok(())
    }

    async fn wait_for_network_idle(&self) -> Result<(), DriverError> {
        Ok(())
    }

    async fn count(&self, selector: &str) -> Result<usize, DriverError> {
        let mut counts = self.counts.lock();
        if let Some(sequence) = counts.get_mut(selector) {
            if sequence.len() > 1 {
                return Ok(sequence.pop_front().unwrap_or(0));
            }
            return Ok(sequence.front().copied().unwrap_or(0));
        }
        Ok(self.texts.lock().get(selector).map_or(0, Vec::len))
    }

    async fn texts(&self, selector: &str) -> Result<Vec<String>, DriverError> {
        Ok(self.texts.lock().get(selector).cloned().unwrap_or_default())
    }

    async fn attrs(
        &self,
        _selector: &str,
        _attribute: &str,
    ) -> Result<Vec<Option<String>>, DriverError> {
        let current = self.current_url.lock().clone();
        Ok(self
            .profile_links
            .lock()
            .get(&current)
            .cloned()
            .unwrap_or_default())
    }

    async fn guest_entries(
        &self,
        _selector: &str,
        _name_selector: &str,
    ) -> Result<Vec<RenderedGuest>, DriverError> {
        Ok(self.guests.lock().clone())
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        self.clicks.lock().push(selector.to_string());
        Ok(())
    }

    async fn click_containing(
        &self,
        selector: &str,
        substrings: &[String],
    ) -> Result<(), DriverError> {
        self.clicks
            .lock()
            .push(format!("{selector} ~ {}", substrings.join("+")));
        Ok(())
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<(), DriverError> {
        self.fills
            .lock()
            .push((selector.to_string(), text.to_string()));
        Ok(())
    }

    async fn press_end(&self, _selector: &str) -> Result<(), DriverError> {
        *self.end_presses.lock() += 1;
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        if self
            .missing_selectors
            .lock()
            .iter()
            .any(|s| s == selector)
        {
            return Err(DriverError::timeout(selector.to_string(), timeout));
        }
        Ok(())
    }

    async fn export_session(&self) -> Result<Value, DriverError> {
        Ok(self
            .session_bundle
            .lock()
            .clone()
            .unwrap_or_else(|| json!({ "cookies": [] })))
    }

    async fn import_session(&self, bundle: &Value) -> Result<(), DriverError> {
        self.imported_bundles.lock().push(bundle.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_count_sequence_consumed_last_repeats() {
        let page = ScriptedPage::new().with_count_sequence(".item", vec![1, 2, 3]);
        assert_eq!(page.count(".item").await.unwrap(), 1);
        assert_eq!(page.count(".item").await.unwrap(), 2);
        assert_eq!(page.count(".item").await.unwrap(), 3);
        assert_eq!(page.count(".item").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_profile_links_follow_navigation() {
        let page = ScriptedPage::new().with_profile_links(
            "https://lu.ma/user/usr-1",
            vec![Some("https://linkedin.com/in/jane")],
        );

        page.navigate("https://lu.ma/user/usr-1").await.unwrap();
        let links = page.attrs(".social-links a", "href").await.unwrap();
        assert_eq!(links.len(), 1);

        page.navigate("https://lu.ma/user/usr-2").await.unwrap();
        assert!(page.attrs(".social-links a", "href").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_interactions_are_recorded() {
        let page = ScriptedPage::new();
        page.click("#go").await.unwrap();
        page.fill("#email", "a@b.c").await.unwrap();
        page.press_end(".scroll").await.unwrap();

        assert_eq!(page.clicks(), vec!["#go"]);
        assert_eq!(page.fills(), vec![("#email".to_string(), "a@b.c".to_string())]);
        assert_eq!(page.end_presses(), 1);
    }
}
