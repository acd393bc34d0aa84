//! crates/gougestop_core/src/flow.rs
//!
//! The screen/session state machine that ties access, capture, submission,
//! results, paywall and error handling together.
//!
//! States: AccessPending -> Capture -> Loading -> {Results | Paywall | Error},
//! with `reset` leading from Results, Paywall and Error back to Capture.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::access::{validate_code, validate_email, InviteCodes, INVALID_INVITE_MESSAGE};
use crate::domain::{AnalysisResult, SessionToken, UsState, Upload, UsageCounters};
use crate::ports::{
    AnalysisService, AuthService, BillingService, PortError, SessionStore, ShareService,
};
use crate::report::share_html;

pub const NO_FILE_MESSAGE: &str = "Please choose a document first.";
pub const SHARE_SENT_MESSAGE: &str = "Sent! Check your inbox.";
pub const SHARE_FAILED_MESSAGE: &str = "Failed to send. Please try again.";

//=========================================================================================
// Errors
//=========================================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FlowError {
    #[error(transparent)]
    Port(#[from] PortError),

    #[error("Cannot {action} while on the {from} screen")]
    InvalidTransition { from: ScreenKind, action: &'static str },
}

pub type FlowResult<T> = Result<T, FlowError>;

//=========================================================================================
// Screens
//=========================================================================================

/// Where the access gate is: asking for an email, or waiting for the emailed code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessStage {
    EnterEmail,
    CodeSent { email: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    AccessPending(AccessStage),
    Capture,
    Loading,
    Results(Box<AnalysisResult>),
    Paywall,
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenKind {
    AccessPending,
    Capture,
    Loading,
    Results,
    Paywall,
    Error,
}

impl Screen {
    pub fn kind(&self) -> ScreenKind {
        match self {
            Screen::AccessPending(_) => ScreenKind::AccessPending,
            Screen::Capture => ScreenKind::Capture,
            Screen::Loading => ScreenKind::Loading,
            Screen::Results(_) => ScreenKind::Results,
            Screen::Paywall => ScreenKind::Paywall,
            Screen::Error(_) => ScreenKind::Error,
        }
    }
}

impl fmt::Display for ScreenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScreenKind::AccessPending => "access",
            ScreenKind::Capture => "capture",
            ScreenKind::Loading => "loading",
            ScreenKind::Results => "results",
            ScreenKind::Paywall => "paywall",
            ScreenKind::Error => "error",
        };
        f.write_str(name)
    }
}

/// How access was obtained. Invite codes carry no token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessGrant {
    Token(SessionToken),
    Invite,
}

/// Outcome of the share action, reported inline on the results screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareStatus {
    Sent,
    Failed(String),
}

impl ShareStatus {
    pub fn message(&self) -> &str {
        match self {
            ShareStatus::Sent => SHARE_SENT_MESSAGE,
            ShareStatus::Failed(message) => message,
        }
    }
}

//=========================================================================================
// The Flow
//=========================================================================================

/// Every collaborator the flow talks to, injected at construction.
#[derive(Clone)]
pub struct FlowPorts {
    pub auth: Arc<dyn AuthService>,
    pub analysis: Arc<dyn AnalysisService>,
    pub billing: Arc<dyn BillingService>,
    pub sharing: Arc<dyn ShareService>,
    pub store: Arc<dyn SessionStore>,
}

pub struct ScanFlow {
    ports: FlowPorts,
    invite_codes: InviteCodes,
    screen: Screen,
    grant: Option<AccessGrant>,
    state: UsState,
    upload: Option<Upload>,
    usage: Option<UsageCounters>,
}

impl ScanFlow {
    pub fn new(ports: FlowPorts, default_state: UsState) -> Self {
        Self {
            ports,
            invite_codes: InviteCodes::default(),
            screen: Screen::AccessPending(AccessStage::EnterEmail),
            grant: None,
            state: default_state,
            upload: None,
            usage: None,
        }
    }

    pub fn with_invite_codes(mut self, codes: InviteCodes) -> Self {
        self.invite_codes = codes;
        self
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn selected_state(&self) -> UsState {
        self.state
    }

    pub fn upload(&self) -> Option<&Upload> {
        self.upload.as_ref()
    }

    pub fn usage(&self) -> Option<UsageCounters> {
        self.usage
    }

    pub fn has_access(&self) -> bool {
        self.grant.is_some()
    }

    fn token(&self) -> Option<&SessionToken> {
        match &self.grant {
            Some(AccessGrant::Token(token)) => Some(token),
            _ => None,
        }
    }

    fn require_access(&self, action: &'static str) -> FlowResult<()> {
        if self.grant.is_some() {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    fn invalid(&self, action: &'static str) -> FlowError {
        FlowError::InvalidTransition {
            from: self.screen.kind(),
            action,
        }
    }

    fn enter(&mut self, screen: Screen) {
        debug!("Screen transition: {} -> {}", self.screen.kind(), screen.kind());
        self.screen = screen;
    }

    //-------------------------------------------------------------------------------------
    // Access
    //-------------------------------------------------------------------------------------

    /// Revalidates a cached token at startup.
    pub async fn resume_session(&mut self) -> FlowResult<&Screen> {
        if !matches!(self.screen, Screen::AccessPending(_)) {
            return Err(self.invalid("resume a session"));
        }
        let Some(token) = self.ports.store.load_token()? else {
            info!("No cached session token; showing the access gate.");
            return Ok(&self.screen);
        };

        match self.ports.auth.check_token(&token).await {
            Ok(true) => {
                info!("Cached session token accepted.");
                self.grant_access(AccessGrant::Token(token)).await;
            }
            Ok(false) => {
                warn!("Cached session token rejected by the backend; clearing it.");
                self.ports.store.clear_token()?;
            }
            Err(PortError::Auth(message)) => {
                warn!("Cached session token rejected: {}; clearing it.", message);
                self.ports.store.clear_token()?;
            }
            Err(e) => {
                // A stored token stands until the backend explicitly rejects it.
                warn!("Could not revalidate cached token ({}); continuing with it.", e);
                self.grant_access(AccessGrant::Token(token)).await;
            }
        }
        Ok(&self.screen)
    }

    /// Asks the backend to email a verification code.
    pub async fn request_code(&mut self, email: &str) -> FlowResult<()> {
        if !matches!(self.screen, Screen::AccessPending(_)) {
            return Err(self.invalid("request a code"));
        }
        let email = validate_email(email)?;
        self.ports.auth.send_code(&email).await.map_err(|e| match e {
            PortError::Server(message) | PortError::Auth(message) => PortError::Validation(message),
            other => other,
        })?;
        info!("Verification code requested.");
        self.enter(Screen::AccessPending(AccessStage::CodeSent { email }));
        Ok(())
    }

    /// Returns the gate to the email form, e.g. to use a different address.
    pub fn change_email(&mut self) -> FlowResult<()> {
        if !matches!(self.screen, Screen::AccessPending(_)) {
            return Err(self.invalid("change the email address"));
        }
        self.enter(Screen::AccessPending(AccessStage::EnterEmail));
        Ok(())
    }

    /// Verifies the emailed code and persists the returned token.
    pub async fn verify_code(&mut self, code: &str) -> FlowResult<()> {
        let email = match &self.screen {
            Screen::AccessPending(AccessStage::CodeSent { email }) => email.clone(),
            _ => return Err(self.invalid("verify a code")),
        };
        let code = validate_code(code)?;
        let token = self.ports.auth.verify_code(&email, &code).await?;
        self.ports.store.save_token(&token)?;
        info!("Email verified; session token stored.");
        self.grant_access(AccessGrant::Token(token)).await;
        Ok(())
    }

    /// Grants access from the static allow-list, without any network call.
    pub fn redeem_invite(&mut self, code: &str) -> FlowResult<()> {
        if !matches!(self.screen, Screen::AccessPending(_)) {
            return Err(self.invalid("redeem an invite code"));
        }
        if !self.invite_codes.accepts(code) {
            return Err(PortError::Validation(INVALID_INVITE_MESSAGE.to_string()).into());
        }
        info!("Invite code accepted.");
        self.grant = Some(AccessGrant::Invite);
        self.enter(Screen::Capture);
        Ok(())
    }

    pub fn sign_out(&mut self) -> FlowResult<()> {
        self.ports.store.clear_token()?;
        self.grant = None;
        self.usage = None;
        self.upload = None;
        self.enter(Screen::AccessPending(AccessStage::EnterEmail));
        Ok(())
    }

    async fn grant_access(&mut self, grant: AccessGrant) {
        self.grant = Some(grant);
        self.enter(Screen::Capture);
        if let Err(e) = self.refresh_usage().await {
            warn!("Could not load usage counters: {}", e);
        }
    }

    /// Replaces the local counters with the backend's. No-op for invite access.
    ///
    /// A rejected token signs the user out before the error is returned.
    pub async fn refresh_usage(&mut self) -> FlowResult<Option<UsageCounters>> {
        let Some(token) = self.token() else {
            return Ok(self.usage);
        };
        let outcome = self.ports.auth.fetch_usage(token).await;
        let usage = match outcome {
            Ok(usage) => usage,
            Err(PortError::Auth(message)) => {
                warn!("Session rejected while loading usage: {}", message);
                self.forget_session();
                return Err(PortError::Auth(message).into());
            }
            Err(e) => return Err(e.into()),
        };
        debug!("Usage refreshed: {} scans remaining, paid={}", usage.scans_remaining, usage.is_paid);
        self.usage = Some(usage);
        Ok(self.usage)
    }

    //-------------------------------------------------------------------------------------
    // Capture
    //-------------------------------------------------------------------------------------

    pub fn select_state(&mut self, code: &str) -> FlowResult<UsState> {
        let state = UsState::parse(code).ok_or_else(|| {
            PortError::Validation(format!("'{}' is not a supported state code.", code.trim()))
        })?;
        self.state = state;
        Ok(state)
    }

    pub fn attach_file(&mut self, upload: Upload) -> FlowResult<()> {
        if self.screen != Screen::Capture {
            return Err(self.invalid("attach a file"));
        }
        debug!("Attached {} ({} bytes)", upload.file_name, upload.bytes.len());
        self.upload = Some(upload);
        Ok(())
    }

    pub fn clear_file(&mut self) {
        self.upload = None;
    }

    //-------------------------------------------------------------------------------------
    // Submission
    //-------------------------------------------------------------------------------------

    /// Uploads the attached document and moves to Results, Paywall, Error, or
    /// back to the access gate if the token was rejected.
    pub async fn submit(&mut self) -> FlowResult<&Screen> {
        if self.screen != Screen::Capture {
            return Err(self.invalid("submit a document"));
        }
        self.require_access("submit a document")?;
        let Some(upload) = self.upload.clone() else {
            return Err(PortError::Validation(NO_FILE_MESSAGE.to_string()).into());
        };

        self.enter(Screen::Loading);
        info!("Submitting {} for analysis (state {}).", upload.file_name, self.state);

        let outcome = self
            .ports
            .analysis
            .analyze(&upload, self.state, self.token())
            .await;

        match outcome {
            Ok(result) => {
                info!("Analysis complete: {} line items.", result.items.len());
                self.upload = None;
                if let Some(usage) = self.usage.as_mut() {
                    usage.record_scan();
                }
                self.enter(Screen::Results(Box::new(result)));
            }
            Err(PortError::LimitReached) => {
                info!("Usage limit reached; showing the paywall.");
                self.enter(Screen::Paywall);
            }
            Err(PortError::Auth(message)) => {
                warn!("Session rejected during analysis: {}", message);
                self.forget_session();
            }
            Err(e) => {
                error!("Analysis failed: {}", e);
                self.enter(Screen::Error(e.to_string()));
            }
        }
        Ok(&self.screen)
    }

    /// Drops a grant the backend rejected. The screen always leaves its
    /// current state; a failure to delete the stored token is only logged.
    fn forget_session(&mut self) {
        let had_token = matches!(self.grant.take(), Some(AccessGrant::Token(_)));
        self.usage = None;
        self.enter(Screen::AccessPending(AccessStage::EnterEmail));
        if had_token {
            if let Err(e) = self.ports.store.clear_token() {
                warn!("Could not clear the rejected session token: {}", e);
            }
        }
    }

    //-------------------------------------------------------------------------------------
    // Results, paywall, reset
    //-------------------------------------------------------------------------------------

    /// Emails the current result. The displayed result is left untouched.
    pub async fn share_results(&self, recipient: &str) -> FlowResult<ShareStatus> {
        let Screen::Results(result) = &self.screen else {
            return Err(self.invalid("share results"));
        };
        let recipient = validate_email(recipient)?;
        let html = share_html(result);

        match self
            .ports
            .sharing
            .share_results(self.token(), &recipient, &html)
            .await
        {
            Ok(()) => {
                info!("Results shared by email.");
                Ok(ShareStatus::Sent)
            }
            Err(PortError::Network(e)) => {
                warn!("Share request failed: {}", e);
                Ok(ShareStatus::Failed(SHARE_FAILED_MESSAGE.to_string()))
            }
            Err(e) => {
                warn!("Share rejected: {}", e);
                Ok(ShareStatus::Failed(e.to_string()))
            }
        }
    }

    /// Obtains the hosted checkout URL. The screen does not change, so a
    /// failure leaves the user where they were.
    pub async fn start_checkout(&self) -> FlowResult<String> {
        self.require_access("start checkout")?;
        let url = self.ports.billing.create_checkout(self.token()).await?;
        info!("Checkout session created.");
        Ok(url)
    }

    /// Consumes a `payment=success` flag from the page query string.
    ///
    /// Returns the query with the flag removed and all other parameters kept.
    pub fn acknowledge_payment(&mut self, query: &str) -> String {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut paid = false;
        let kept: Vec<&str> = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .filter(|pair| {
                if *pair == "payment=success" {
                    paid = true;
                    false
                } else {
                    true
                }
            })
            .collect();

        if paid {
            info!("Returned from a completed checkout.");
            let usage = self.usage.get_or_insert_with(UsageCounters::default);
            usage.is_paid = true;
        }
        kept.join("&")
    }

    /// Back to an empty Capture screen. The selected state is kept.
    pub fn reset(&mut self) -> FlowResult<()> {
        match self.screen {
            Screen::AccessPending(_) | Screen::Loading => Err(self.invalid("reset")),
            _ => {
                self.upload = None;
                self.enter(Screen::Capture);
                Ok(())
            }
        }
    }
}
