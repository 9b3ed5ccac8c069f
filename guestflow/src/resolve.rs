//! Profile resolution: one page visit per candidate.
//!
//! Navigation is strictly sequential because every lookup reuses the single
//! authenticated page context; this is the dominant latency cost of a run.
//! Absence of a LinkedIn link is not an error; the candidate simply stays
//! unenriched and the export filter drops it later.
//!
//! Resolution is restartable: [`ResolveProgress`] is updated after every
//! candidate, so a rerun after a mid-flight failure can resume from the first
//! unresolved index instead of repeating the whole pass.

use regex::Regex;
use tracing::{debug, info};

use crate::cancellation::CancellationToken;
use crate::config::ScrapeConfig;
use crate::driver::PageDriver;
use crate::errors::GuestflowError;
use crate::records::GuestCandidate;

/// Checkpoint of a resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveProgress {
    /// Index of the next unprocessed candidate.
    pub next_index: usize,
    /// Candidates enriched with a LinkedIn URL so far.
    pub resolved: usize,
    /// Candidates visited that had no matching link.
    pub unmatched: usize,
}

impl ResolveProgress {
    /// Creates a checkpoint at the start of the list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Resolves external profile links for candidates.
pub struct ProfileResolver {
    social_links_selector: String,
    pattern: Regex,
}

impl ProfileResolver {
    /// Builds a resolver from configuration.
    pub fn from_config(config: &ScrapeConfig) -> Result<Self, GuestflowError> {
        let pattern = Regex::new(&config.linkedin_pattern).map_err(|e| {
            GuestflowError::InvalidConfig(format!(
                "bad linkedin pattern {:?}: {e}",
                config.linkedin_pattern
            ))
        })?;
        Ok(Self {
            social_links_selector: config.selectors.social_links.clone(),
            pattern,
        })
    }

    /// Resolves every candidate from `progress.next_index` onward, updating
    /// the checkpoint after each one.
    ///
    /// On a driver failure the error propagates and `progress` still points
    /// at the candidate that failed, so the caller can resume there.
    pub async fn resolve(
        &self,
        driver: &dyn PageDriver,
        candidates: &mut [GuestCandidate],
        progress: &mut ResolveProgress,
        cancel: &CancellationToken,
    ) -> Result<(), GuestflowError> {
        let total = candidates.len();
        while progress.next_index < total {
            cancel.ensure_active()?;
            let index = progress.next_index;
            let candidate = &mut candidates[index];

            debug!(
                index,
                total,
                name = %candidate.display_name(),
                url = %candidate.profile_url,
                "resolving profile"
            );

            driver.navigate(&candidate.profile_url).await?;
            driver.wait_for_network_idle().await?;

            match self.first_matching_link(driver).await? {
                Some(linkedin_url) => {
                    debug!(name = %candidate.display_name(), linkedin = %linkedin_url, "link found");
                    candidate.linkedin_url = Some(linkedin_url);
                    progress.resolved += 1;
                }
                None => {
                    debug!(name = %candidate.display_name(), "no matching link, leaving unenriched");
                    progress.unmatched += 1;
                }
            }

            progress.next_index = index + 1;
        }

        info!(
            resolved = progress.resolved,
            unmatched = progress.unmatched,
            total,
            "profile resolution complete"
        );
        Ok(())
    }

    /// The first non-empty social-link href matching the pattern, if any.
    async fn first_matching_link(
        &self,
        driver: &dyn PageDriver,
    ) -> Result<Option<String>, GuestflowError> {
        let hrefs = driver
            .attrs(&self.social_links_selector, "href")
            .await?;
        Ok(hrefs
            .into_iter()
            .flatten()
            .find(|href| !href.is_empty() && self.pattern.is_match(href)))
    }
}
