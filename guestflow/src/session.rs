//! Session persistence and the interactive login flow.
//!
//! A persisted bundle at the well-known path short-circuits login entirely.
//! Otherwise the flow walks an explicit state machine (`NoSession ->
//! AwaitingCode -> Authenticated`) with the one-time code supplied through
//! [`VerificationCodeSource`], so a harness can feed the code
//! programmatically instead of a human typing at a console.
//!
//! There is no expiry detection: an expired bundle looks valid until a later
//! navigation fails.

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::ScrapeConfig;
use crate::driver::PageDriver;
use crate::errors::GuestflowError;

const HEADING_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Supplies the one-time verification code on demand.
#[async_trait]
pub trait VerificationCodeSource: Send + Sync {
    /// Produces the code the user received out of band.
    async fn verification_code(&self) -> Result<String, GuestflowError>;
}

/// Reads the verification code from standard input.
#[derive(Debug, Clone, Default)]
pub struct ConsoleCodeSource;

#[async_trait]
impl VerificationCodeSource for ConsoleCodeSource {
    async fn verification_code(&self) -> Result<String, GuestflowError> {
        println!("Check your email for the verification code.");
        print!("Enter the verification code: ");
        use std::io::Write as _;
        std::io::stdout().flush()?;

        let line = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|_| line)
        })
        .await
        .map_err(|e| GuestflowError::Login(format!("code input task failed: {e}")))??;

        Ok(line.trim().to_string())
    }
}

/// Stores the opaque credential bundle at a fixed path.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Creates a store over the given path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Loads the persisted bundle, or `None` if the file is absent.
    pub fn load(&self) -> Result<Option<Value>, GuestflowError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| GuestflowError::SessionStore(format!("read {:?}: {e}", self.path)))?;
        let bundle = serde_json::from_str(&text)
            .map_err(|e| GuestflowError::SessionStore(format!("parse {:?}: {e}", self.path)))?;
        Ok(Some(bundle))
    }

    /// Persists a bundle, overwriting any previous one.
    pub fn save(&self, bundle: &Value) -> Result<(), GuestflowError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| GuestflowError::SessionStore(format!("mkdir {parent:?}: {e}")))?;
        }
        let text = serde_json::to_string_pretty(bundle)?;
        std::fs::write(&self.path, text)
            .map_err(|e| GuestflowError::SessionStore(format!("write {:?}: {e}", self.path)))?;
        Ok(())
    }
}

/// Login flow states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    /// No credentials; the flow has not started.
    NoSession,
    /// Email submitted; a code has been requested and the flow is paused.
    AwaitingCode,
    /// Login complete.
    Authenticated,
}

/// The interactive login state machine.
///
/// `begin` drives the page to the paused `AwaitingCode` state; `submit_code`
/// is the explicit resume.
pub struct LoginFlow<'a> {
    config: &'a ScrapeConfig,
    state: LoginState,
}

impl<'a> LoginFlow<'a> {
    /// Creates a flow in the `NoSession` state.
    #[must_use]
    pub fn new(config: &'a ScrapeConfig) -> Self {
        Self {
            config,
            state: LoginState::NoSession,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> LoginState {
        self.state
    }

    /// Navigates to the sign-in page, submits the account email, and waits
    /// for the code-entry heading. Leaves the flow paused at `AwaitingCode`.
    pub async fn begin(
        &mut self,
        driver: &dyn PageDriver,
        next_target: &str,
    ) -> Result<(), GuestflowError> {
        if self.state != LoginState::NoSession {
            return Err(GuestflowError::Login(format!(
                "begin called in state {:?}",
                self.state
            )));
        }
        let email = &self.config.login.email;
        if email.is_empty() {
            return Err(GuestflowError::Login(
                "no account email configured for login".to_string(),
            ));
        }

        let login_url = format!("{}?next={next_target}", self.config.login.signin_url);
        info!(url = %login_url, "starting interactive login");
        driver.navigate(&login_url).await?;
        driver.wait_for_network_idle().await?;

        let selectors = &self.config.selectors;
        driver.fill(&selectors.email_input, email).await?;
        driver
            .click_containing(
                &selectors.continue_button,
                std::slice::from_ref(&selectors.continue_button_text),
            )
            .await?;

        self.await_code_heading(driver).await?;
        self.state = LoginState::AwaitingCode;
        Ok(())
    }

    /// Resumes a paused flow with the out-of-band verification code. On
    /// success the flow is `Authenticated`.
    pub async fn submit_code(
        &mut self,
        driver: &dyn PageDriver,
        code: &str,
    ) -> Result<(), GuestflowError> {
        if self.state != LoginState::AwaitingCode {
            return Err(GuestflowError::Login(format!(
                "submit_code called in state {:?}",
                self.state
            )));
        }

        let digits = self.config.login.code_digits;
        if code.len() != digits || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(GuestflowError::Login(format!(
                "verification code must be {digits} digits"
            )));
        }

        for (index, digit) in code.chars().enumerate() {
            driver
                .fill(&format!("#code-input-{index}"), &digit.to_string())
                .await?;
        }

        driver
            .wait_for_selector(
                &self.config.selectors.login_marker,
                self.config.login.marker_timeout(),
            )
            .await?;

        info!("login successful");
        self.state = LoginState::Authenticated;
        Ok(())
    }

    /// Polls until the code-entry heading with the expected text renders.
    async fn await_code_heading(&self, driver: &dyn PageDriver) -> Result<(), GuestflowError> {
        let selectors = &self.config.selectors;
        let timeout = self.config.login.marker_timeout();
        let deadline = Instant::now() + timeout;
        loop {
            let headings = driver.texts(&selectors.code_heading).await?;
            if headings
                .iter()
                .any(|h| h.contains(&selectors.code_heading_text))
            {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(GuestflowError::Login(format!(
                    "code-entry heading {:?} did not appear within {timeout:?}",
                    selectors.code_heading_text
                )));
            }
            tokio::time::sleep(HEADING_POLL_INTERVAL).await;
        }
    }
}

/// Restores a persisted session or runs the full login flow, persisting the
/// fresh bundle afterwards.
pub async fn ensure_session(
    driver: &dyn PageDriver,
    config: &ScrapeConfig,
    store: &SessionStore,
    codes: &dyn VerificationCodeSource,
    next_target: &str,
) -> Result<(), GuestflowError> {
    if let Some(bundle) = store.load()? {
        info!("reusing persisted session bundle");
        driver.import_session(&bundle).await?;
        return Ok(());
    }

    warn!("no session bundle found, interactive login required");
    let mut flow = LoginFlow::new(config);
    flow.begin(driver, next_target).await?;
    let code = codes.verification_code().await?;
    flow.submit_code(driver, &code).await?;

    let bundle = driver.export_session().await?;
    store.save(&bundle)?;
    info!("session bundle persisted");
    Ok(())
}

/// The `next` target for the sign-in URL: the event path relative to the
/// origin.
#[must_use]
pub fn next_target<'u>(event_url: &'u str, base_origin: &str) -> &'u str {
    let origin = base_origin.trim_end_matches('/');
    event_url
        .strip_prefix(origin)
        .map_or(event_url, |rest| rest.trim_start_matches('/'))
}
