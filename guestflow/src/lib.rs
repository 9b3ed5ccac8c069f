//! # Guestflow
//!
//! A headless-browser scraper for Luma event guest lists.
//!
//! Guestflow drives a Chrome instance over the DevTools protocol to:
//!
//! - **Restore or establish a session**: Persisted credential bundles with an
//!   email-code login flow as fallback
//! - **Stabilize the guest modal**: Scroll-and-settle until the rendered
//!   count stops changing, bounded by rounds and a deadline
//! - **Extract and resolve guests**: Name splitting, profile URLs, and a
//!   checkpointed per-profile LinkedIn lookup
//! - **Export to CSV**: Deduplicated rows decorated with event metadata
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use guestflow::prelude::*;
//!
//! let config = ScrapeConfig::new();
//! let page = ChromePage::connect("ws://127.0.0.1:9222/...", config.network_idle()).await?;
//! let scrape = EventScrape::new(&page, &config, &ConsoleCodeSource)?;
//! let summary = scrape.run("https://lu.ma/some-event", &CancellationToken::new()).await?;
//! println!("wrote {} rows", summary.export.written);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod driver;
pub mod errors;
pub mod export;
pub mod extract;
pub mod metadata;
pub mod records;
pub mod resolve;
pub mod run;
pub mod session;
pub mod stabilize;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{
        LoginConfig, ScrapeConfig, SelectorConfig, StabilizationConfig,
    };
    pub use crate::driver::cdp::ChromePage;
    pub use crate::driver::{PageDriver, RenderedGuest};
    pub use crate::errors::{DriverError, GuestflowError};
    pub use crate::export::{export_guests, ExportSummary};
    pub use crate::extract::extract_candidates;
    pub use crate::metadata::extract_event_metadata;
    pub use crate::records::{EventMetadata, GuestCandidate};
    pub use crate::resolve::{ProfileResolver, ResolveProgress};
    pub use crate::run::{EventScrape, RunSummary};
    pub use crate::session::{
        ensure_session, ConsoleCodeSource, LoginFlow, LoginState, SessionStore,
        VerificationCodeSource,
    };
    pub use crate::stabilize::{
        run_to_stability, CountSignal, ScrollNudge, StabilizationOutcome,
        StabilizationState,
    };
}
