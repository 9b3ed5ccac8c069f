//! Event metadata extraction from the loaded event page.
//!
//! Read once per run; the same values decorate every exported row. The venue
//! renders differently for in-person events (a link with a name and address
//! line) and virtual ones (a plain container with the platform name), so the
//! place lookup tries the link form first.

use tracing::info;

use crate::config::ScrapeConfig;
use crate::driver::PageDriver;
use crate::errors::GuestflowError;
use crate::records::EventMetadata;

const VENUE_TITLE: &str = ".title.text-ellipses";
const VENUE_DESC: &str = ".desc.text-ellipses";

/// Reads the event metadata off the current page.
pub async fn extract_event_metadata(
    driver: &dyn PageDriver,
    config: &ScrapeConfig,
) -> Result<EventMetadata, GuestflowError> {
    let selectors = &config.selectors;

    let title = first_text(driver, &selectors.event_title, "event title").await?;
    let date = first_text(driver, &selectors.event_date, "event date").await?;
    let time = first_text(driver, &selectors.event_time, "event time").await?;
    let place = extract_place(driver, config).await?;
    let host = first_text(driver, &selectors.event_host, "event host").await?;

    let metadata = EventMetadata {
        title,
        date,
        time,
        place,
        host,
    };
    info!(
        title = %metadata.title,
        date = %metadata.date,
        place = %metadata.place,
        host = %metadata.host,
        "event metadata extracted"
    );
    Ok(metadata)
}

async fn extract_place(
    driver: &dyn PageDriver,
    config: &ScrapeConfig,
) -> Result<String, GuestflowError> {
    let selectors = &config.selectors;

    // In-person events render the venue as a link with a name and an address
    // line; virtual events render a plain container with just the platform.
    if driver.count(&selectors.venue_container).await? > 0 {
        let name = first_text(
            driver,
            &format!("{} {VENUE_TITLE}", selectors.venue_container),
            "venue name",
        )
        .await?;
        let address = first_text(
            driver,
            &format!("{} {VENUE_DESC}", selectors.venue_container),
            "venue address",
        )
        .await?;
        return Ok(format!("{name}, {address}"));
    }

    first_text(
        driver,
        &format!("{} {VENUE_TITLE}", selectors.virtual_venue_container),
        "event place",
    )
    .await
}

async fn first_text(
    driver: &dyn PageDriver,
    selector: &str,
    what: &str,
) -> Result<String, GuestflowError> {
    driver
        .texts(selector)
        .await?
        .into_iter()
        .next()
        .map(|t| t.trim().to_string())
        .ok_or_else(|| GuestflowError::MissingElement(format!("{what} ({selector})")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedPage;

    fn base_page() -> ScriptedPage {
        ScriptedPage::new()
            .with_texts("h1.title", vec!["AI for Developers"])
            .with_texts(".icon-row .title", vec!["Thursday, March 6"])
            .with_texts(".icon-row .desc", vec!["6:00 PM - 9:00 PM"])
            .with_texts(".hosts a.title .fw-medium", vec!["GitAuto"])
    }

    #[tokio::test]
    async fn test_in_person_event_place_joins_name_and_address() {
        let page = base_page()
            .with_count_sequence(".meta.flex-column > a.row-container", vec![1])
            .with_texts(
                ".meta.flex-column > a.row-container .title.text-ellipses",
                vec!["Moscone Center"],
            )
            .with_texts(
                ".meta.flex-column > a.row-container .desc.text-ellipses",
                vec!["747 Howard St, San Francisco"],
            );

        let metadata = extract_event_metadata(&page, &ScrapeConfig::default())
            .await
            .expect("metadata");

        assert_eq!(metadata.title, "AI for Developers");
        assert_eq!(metadata.place, "Moscone Center, 747 Howard St, San Francisco");
        assert_eq!(metadata.host, "GitAuto");
    }

    #[tokio::test]
    async fn test_virtual_event_place_is_platform_only() {
        let page = base_page().with_texts(
            ".meta.flex-column > div.row-container .title.text-ellipses",
            vec!["Zoom"],
        );

        let metadata = extract_event_metadata(&page, &ScrapeConfig::default())
            .await
            .expect("metadata");

        assert_eq!(metadata.place, "Zoom");
    }

    #[tokio::test]
    async fn test_missing_title_is_an_error() {
        let page = ScriptedPage::new();
        let err = extract_event_metadata(&page, &ScrapeConfig::default())
            .await
            .expect_err("missing title");
        assert!(matches!(err, GuestflowError::MissingElement(_)));
        assert!(err.to_string().contains("event title"));
    }
}
