//! End-to-end orchestration of a scrape run.
//!
//! Strictly sequential: session -> event page -> metadata -> guest modal ->
//! stabilization -> extraction -> resolution -> export. The browser page is
//! the only shared resource and exactly one stage touches it at a time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::cancellation::CancellationToken;
use crate::config::ScrapeConfig;
use crate::driver::PageDriver;
use crate::errors::{DriverError, GuestflowError};
use crate::export::{export_guests, ExportSummary};
use crate::extract::extract_candidates;
use crate::metadata::extract_event_metadata;
use crate::records::EventMetadata;
use crate::resolve::{ProfileResolver, ResolveProgress};
use crate::session::{ensure_session, next_target, SessionStore, VerificationCodeSource};
use crate::stabilize::{run_to_stability, CountSignal, ScrollNudge, StabilizationOutcome};

const MODAL_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Unique ID of this run.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: f64,
    /// Metadata of the scraped event.
    pub event: EventMetadata,
    /// How the guest list loading loop ended.
    pub stabilization: StabilizationOutcome,
    /// Candidates extracted from the rendered list.
    pub candidates: usize,
    /// Export counts.
    pub export: ExportSummary,
    /// Where the CSV was written.
    pub output_path: PathBuf,
}

/// Count of guest anchors currently rendered in the modal.
struct GuestCount<'d> {
    driver: &'d dyn PageDriver,
    selector: &'d str,
}

#[async_trait]
impl CountSignal for GuestCount<'_> {
    async fn sample(&self) -> Result<usize, DriverError> {
        self.driver.count(self.selector).await
    }
}

/// Scrolls the modal container to its end via focus + End key.
struct EndKeyNudge<'d> {
    driver: &'d dyn PageDriver,
    selector: &'d str,
}

#[async_trait]
impl ScrollNudge for EndKeyNudge<'_> {
    async fn nudge(&self) -> Result<(), DriverError> {
        self.driver.press_end(self.selector).await
    }
}

/// One event scrape over a shared page driver.
pub struct EventScrape<'a> {
    driver: &'a dyn PageDriver,
    config: &'a ScrapeConfig,
    codes: &'a dyn VerificationCodeSource,
    resolver: ProfileResolver,
}

impl<'a> EventScrape<'a> {
    /// Builds a scrape over a driver, configuration, and code source.
    pub fn new(
        driver: &'a dyn PageDriver,
        config: &'a ScrapeConfig,
        codes: &'a dyn VerificationCodeSource,
    ) -> Result<Self, GuestflowError> {
        let resolver = ProfileResolver::from_config(config)?;
        Ok(Self {
            driver,
            config,
            codes,
            resolver,
        })
    }

    /// Runs the full pipeline against one event URL.
    pub async fn run(
        &self,
        event_url: &str,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, GuestflowError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("scrape_run", %run_id, url = event_url);
        self.run_inner(event_url, cancel, run_id).instrument(span).await
    }

    async fn run_inner(
        &self,
        event_url: &str,
        cancel: &CancellationToken,
        run_id: Uuid,
    ) -> Result<RunSummary, GuestflowError> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let config = self.config;
        let selectors = &config.selectors;

        // Session first: a persisted bundle skips login entirely.
        let store = SessionStore::new(&config.session_path);
        ensure_session(
            self.driver,
            config,
            &store,
            self.codes,
            next_target(event_url, &config.base_origin),
        )
        .await?;
        cancel.ensure_active()?;

        info!("navigating to event page");
        self.driver.navigate(event_url).await?;
        self.driver.wait_for_network_idle().await?;

        let event = extract_event_metadata(self.driver, config).await?;
        cancel.ensure_active()?;

        info!("opening guest panel");
        self.driver
            .click_containing(&selectors.guests_button, &selectors.guests_button_texts)
            .await?;
        self.driver
            .wait_for_selector(&selectors.modal_body, MODAL_TIMEOUT)
            .await?;

        let signal = GuestCount {
            driver: self.driver,
            selector: &selectors.guest_anchor,
        };
        let scroll = EndKeyNudge {
            driver: self.driver,
            selector: &selectors.modal_scroll,
        };
        let stabilization =
            run_to_stability(&signal, &scroll, &config.stabilization, cancel).await?;
        if !stabilization.converged() {
            warn!(
                last_count = ?stabilization.final_count(),
                "guest list never stabilized, exporting what was rendered"
            );
        }

        // Re-query fresh: rendered order is only trustworthy now.
        let entries = self
            .driver
            .guest_entries(&selectors.guest_anchor, &selectors.guest_name)
            .await?;
        let mut candidates = extract_candidates(&entries, &config.base_origin);
        info!(
            rendered = entries.len(),
            candidates = candidates.len(),
            "guest entries extracted"
        );

        let mut progress = ResolveProgress::new();
        self.resolver
            .resolve(self.driver, &mut candidates, &mut progress, cancel)
            .await?;

        let export = export_guests(&config.output_path, &candidates, &event, &config.source_tag)?;

        let summary = RunSummary {
            run_id,
            started_at,
            duration_ms: timer.elapsed().as_secs_f64() * 1000.0,
            event,
            stabilization,
            candidates: candidates.len(),
            export,
            output_path: config.output_path.clone(),
        };
        info!(
            written = summary.export.written,
            duration_ms = summary.duration_ms,
            path = %summary.output_path.display(),
            "run complete"
        );
        Ok(summary)
    }
}
