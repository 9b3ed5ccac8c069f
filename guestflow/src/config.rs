//! Configuration for a scrape run.
//!
//! Every knob has a serde default so a config file only needs to name what it
//! changes; an absent file means all defaults. Selectors are configuration
//! because the upstream markup changes more often than the pipeline does.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CSS selectors for the event page and guest modal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Event title heading.
    #[serde(default = "default_title_selector")]
    pub event_title: String,
    /// Event date (first match wins).
    #[serde(default = "default_date_selector")]
    pub event_date: String,
    /// Event time (first match wins).
    #[serde(default = "default_time_selector")]
    pub event_time: String,
    /// Venue container for in-person events.
    #[serde(default = "default_venue_selector")]
    pub venue_container: String,
    /// Venue container for virtual events.
    #[serde(default = "default_virtual_venue_selector")]
    pub virtual_venue_container: String,
    /// Host name inside the "Presented by" link.
    #[serde(default = "default_host_selector")]
    pub event_host: String,
    /// Candidate elements for the guests button.
    #[serde(default = "default_guests_button_selector")]
    pub guests_button: String,
    /// Substrings that must all appear in the guests button text
    /// ("A, B and N others").
    #[serde(default = "default_guests_button_texts")]
    pub guests_button_texts: Vec<String>,
    /// The guest-list modal body.
    #[serde(default = "default_modal_selector")]
    pub modal_body: String,
    /// The scrollable container inside the modal.
    #[serde(default = "default_modal_scroll_selector")]
    pub modal_scroll: String,
    /// Guest profile anchors inside the modal.
    #[serde(default = "default_guest_anchor_selector")]
    pub guest_anchor: String,
    /// Display-name element inside a guest anchor.
    #[serde(default = "default_guest_name_selector")]
    pub guest_name: String,
    /// Social links on a profile page.
    #[serde(default = "default_social_links_selector")]
    pub social_links: String,
    /// Email input on the sign-in page.
    #[serde(default = "default_email_input_selector")]
    pub email_input: String,
    /// Candidate elements for the sign-in submit button.
    #[serde(default = "default_continue_button_selector")]
    pub continue_button: String,
    /// Text the sign-in submit button must contain.
    #[serde(default = "default_continue_button_text")]
    pub continue_button_text: String,
    /// Heading that confirms the code entry step.
    #[serde(default = "default_code_heading_selector")]
    pub code_heading: String,
    /// Text the code-entry heading must contain.
    #[serde(default = "default_code_heading_text")]
    pub code_heading_text: String,
    /// Avatar element that confirms a completed login.
    #[serde(default = "default_avatar_selector")]
    pub login_marker: String,
}

fn default_title_selector() -> String {
    "h1.title".to_string()
}

fn default_date_selector() -> String {
    ".icon-row .title".to_string()
}

fn default_time_selector() -> String {
    ".icon-row .desc".to_string()
}

fn default_venue_selector() -> String {
    ".meta.flex-column > a.row-container".to_string()
}

fn default_virtual_venue_selector() -> String {
    ".meta.flex-column > div.row-container".to_string()
}

fn default_host_selector() -> String {
    ".hosts a.title .fw-medium".to_string()
}

fn default_guests_button_selector() -> String {
    "button".to_string()
}

fn default_guests_button_texts() -> Vec<String> {
    vec!["and".to_string(), "others".to_string()]
}

fn default_modal_selector() -> String {
    ".lux-modal-body".to_string()
}

fn default_modal_scroll_selector() -> String {
    ".lux-modal-body div.flex-column.outer.overflow-auto".to_string()
}

fn default_guest_anchor_selector() -> String {
    ".flex-center.gap-2.spread a[href^=\"/user/usr-\"]".to_string()
}

fn default_guest_name_selector() -> String {
    ".name.text-ellipses".to_string()
}

fn default_social_links_selector() -> String {
    ".social-links a".to_string()
}

fn default_email_input_selector() -> String {
    "input[type=\"email\"]".to_string()
}

fn default_continue_button_selector() -> String {
    "button".to_string()
}

fn default_continue_button_text() -> String {
    "Continue with Email".to_string()
}

fn default_code_heading_selector() -> String {
    "h1".to_string()
}

fn default_code_heading_text() -> String {
    "Enter Code".to_string()
}

fn default_avatar_selector() -> String {
    ".avatar-wrapper.flex-center".to_string()
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            event_title: default_title_selector(),
            event_date: default_date_selector(),
            event_time: default_time_selector(),
            venue_container: default_venue_selector(),
            virtual_venue_container: default_virtual_venue_selector(),
            event_host: default_host_selector(),
            guests_button: default_guests_button_selector(),
            guests_button_texts: default_guests_button_texts(),
            modal_body: default_modal_selector(),
            modal_scroll: default_modal_scroll_selector(),
            guest_anchor: default_guest_anchor_selector(),
            guest_name: default_guest_name_selector(),
            social_links: default_social_links_selector(),
            email_input: default_email_input_selector(),
            continue_button: default_continue_button_selector(),
            continue_button_text: default_continue_button_text(),
            code_heading: default_code_heading_selector(),
            code_heading_text: default_code_heading_text(),
            login_marker: default_avatar_selector(),
        }
    }
}

/// Tuning for the stabilization detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilizationConfig {
    /// Consecutive unchanged observations required to declare convergence.
    #[serde(default = "default_stability_threshold")]
    pub stability_threshold: usize,
    /// Settle wait after each scroll nudge, in seconds.
    #[serde(default = "default_settle_seconds")]
    pub settle_seconds: f64,
    /// Hard cap on rounds; exceeding it reports non-convergence.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    /// Overall deadline for the loop, in seconds.
    #[serde(default = "default_deadline_seconds")]
    pub deadline_seconds: f64,
}

fn default_stability_threshold() -> usize {
    3
}

fn default_settle_seconds() -> f64 {
    5.0
}

fn default_max_rounds() -> usize {
    120
}

fn default_deadline_seconds() -> f64 {
    900.0
}

impl Default for StabilizationConfig {
    fn default() -> Self {
        Self {
            stability_threshold: default_stability_threshold(),
            settle_seconds: default_settle_seconds(),
            max_rounds: default_max_rounds(),
            deadline_seconds: default_deadline_seconds(),
        }
    }
}

impl StabilizationConfig {
    /// Creates a new stabilization configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the stability threshold.
    #[must_use]
    pub fn with_stability_threshold(mut self, rounds: usize) -> Self {
        self.stability_threshold = rounds;
        self
    }

    /// Sets the settle interval.
    #[must_use]
    pub fn with_settle_seconds(mut self, seconds: f64) -> Self {
        self.settle_seconds = seconds;
        self
    }

    /// Sets the round cap.
    #[must_use]
    pub fn with_max_rounds(mut self, rounds: usize) -> Self {
        self.max_rounds = rounds;
        self
    }

    /// Sets the overall deadline.
    #[must_use]
    pub fn with_deadline_seconds(mut self, seconds: f64) -> Self {
        self.deadline_seconds = seconds;
        self
    }

    /// Gets the settle interval as a Duration.
    #[must_use]
    pub fn settle_interval(&self) -> Duration {
        Duration::from_secs_f64(self.settle_seconds)
    }

    /// Gets the deadline as a Duration.
    #[must_use]
    pub fn deadline(&self) -> Duration {
        Duration::from_secs_f64(self.deadline_seconds)
    }
}

/// Configuration for the interactive login flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginConfig {
    /// Sign-in page URL; the event slug is appended as the `next` target.
    #[serde(default = "default_signin_url")]
    pub signin_url: String,
    /// Account email used for the one-time-code login.
    #[serde(default)]
    pub email: String,
    /// Timeout for the post-login marker, in seconds.
    #[serde(default = "default_login_marker_timeout")]
    pub marker_timeout_seconds: f64,
    /// Number of one-time-code digit inputs (`#code-input-0..`).
    #[serde(default = "default_code_digits")]
    pub code_digits: usize,
}

fn default_signin_url() -> String {
    "https://lu.ma/signin".to_string()
}

fn default_login_marker_timeout() -> f64 {
    30.0
}

fn default_code_digits() -> usize {
    6
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            signin_url: default_signin_url(),
            email: String::new(),
            marker_timeout_seconds: default_login_marker_timeout(),
            code_digits: default_code_digits(),
        }
    }
}

impl LoginConfig {
    /// Gets the marker timeout as a Duration.
    #[must_use]
    pub fn marker_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.marker_timeout_seconds)
    }
}

/// Combined configuration for a scrape run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Site origin that relative profile hrefs are joined to.
    #[serde(default = "default_base_origin")]
    pub base_origin: String,
    /// Regex matched against social-link hrefs to find the LinkedIn one.
    #[serde(default = "default_linkedin_pattern")]
    pub linkedin_pattern: String,
    /// Constant source tag written to `custom_att_6`.
    #[serde(default = "default_source_tag")]
    pub source_tag: String,
    /// Path of the persisted session bundle.
    #[serde(default = "default_session_path")]
    pub session_path: PathBuf,
    /// Path of the output CSV.
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
    /// Network-idle quiet window after navigation, in seconds.
    #[serde(default = "default_network_idle_seconds")]
    pub network_idle_seconds: f64,
    /// Selector configuration.
    #[serde(default)]
    pub selectors: SelectorConfig,
    /// Stabilization tuning.
    #[serde(default)]
    pub stabilization: StabilizationConfig,
    /// Login flow configuration.
    #[serde(default)]
    pub login: LoginConfig,
}

fn default_base_origin() -> String {
    "https://lu.ma".to_string()
}

fn default_linkedin_pattern() -> String {
    r"linkedin\.com".to_string()
}

fn default_source_tag() -> String {
    "Luma".to_string()
}

fn downloads_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Downloads")
}

fn default_session_path() -> PathBuf {
    downloads_dir().join("luma-auth.json")
}

fn default_output_path() -> PathBuf {
    downloads_dir().join("luma_participants.csv")
}

fn default_network_idle_seconds() -> f64 {
    2.0
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_origin: default_base_origin(),
            linkedin_pattern: default_linkedin_pattern(),
            source_tag: default_source_tag(),
            session_path: default_session_path(),
            output_path: default_output_path(),
            network_idle_seconds: default_network_idle_seconds(),
            selectors: SelectorConfig::default(),
            stabilization: StabilizationConfig::default(),
            login: LoginConfig::default(),
        }
    }
}

impl ScrapeConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, crate::errors::GuestflowError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Sets the base origin.
    #[must_use]
    pub fn with_base_origin(mut self, origin: impl Into<String>) -> Self {
        self.base_origin = origin.into();
        self
    }

    /// Sets the session bundle path.
    #[must_use]
    pub fn with_session_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_path = path.into();
        self
    }

    /// Sets the output CSV path.
    #[must_use]
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    /// Sets the stabilization tuning.
    #[must_use]
    pub fn with_stabilization(mut self, stabilization: StabilizationConfig) -> Self {
        self.stabilization = stabilization;
        self
    }

    /// Gets the network-idle quiet window as a Duration.
    #[must_use]
    pub fn network_idle(&self) -> Duration {
        Duration::from_secs_f64(self.network_idle_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_defaults() {
        let selectors = SelectorConfig::default();
        assert_eq!(selectors.event_title, "h1.title");
        assert!(selectors.guest_anchor.contains("/user/usr-"));
        assert_eq!(selectors.modal_body, ".lux-modal-body");
    }

    #[test]
    fn test_stabilization_defaults() {
        let config = StabilizationConfig::default();
        assert_eq!(config.stability_threshold, 3);
        assert_eq!(config.settle_interval(), Duration::from_secs(5));
        assert_eq!(config.max_rounds, 120);
    }

    #[test]
    fn test_stabilization_builder() {
        let config = StabilizationConfig::new()
            .with_stability_threshold(2)
            .with_settle_seconds(0.5)
            .with_max_rounds(10)
            .with_deadline_seconds(60.0);

        assert_eq!(config.stability_threshold, 2);
        assert_eq!(config.settle_interval(), Duration::from_millis(500));
        assert_eq!(config.max_rounds, 10);
        assert_eq!(config.deadline(), Duration::from_secs(60));
    }

    #[test]
    fn test_scrape_config_defaults() {
        let config = ScrapeConfig::default();
        assert_eq!(config.base_origin, "https://lu.ma");
        assert_eq!(config.source_tag, "Luma");
        assert!(config.session_path.ends_with("luma-auth.json"));
        assert!(config.output_path.ends_with("luma_participants.csv"));
    }

    #[test]
    fn test_partial_json_deserializes_with_defaults() {
        let config: ScrapeConfig =
            serde_json::from_str(r#"{"stabilization": {"stability_threshold": 5}}"#)
                .expect("partial config should deserialize");

        assert_eq!(config.stabilization.stability_threshold, 5);
        assert_eq!(config.stabilization.max_rounds, 120);
        assert_eq!(config.base_origin, "https://lu.ma");
    }

    #[test]
    fn test_config_round_trip() {
        let config = ScrapeConfig::new().with_base_origin("https://example.test");
        let json = serde_json::to_string(&config).expect("serializes");
        let back: ScrapeConfig = serde_json::from_str(&json).expect("deserializes");
        assert_eq!(back.base_origin, "https://example.test");
    }
}
