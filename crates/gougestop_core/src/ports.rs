//! crates/gougestop_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the client's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the HTTP backend and of where the session token is kept.

use async_trait::async_trait;
use crate::domain::{AnalysisResult, SessionToken, UsState, Upload, UsageCounters};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from the transport and storage layers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PortError {
    /// Malformed input, or input the backend refused (bad address, rate limit).
    #[error("{0}")]
    Validation(String),
    /// The verification code or the session token was rejected.
    #[error("{0}")]
    Auth(String),
    /// The account has used up its free scans.
    #[error("Usage limit reached")]
    LimitReached,
    /// Any other non-2xx response, or a `success: false` payload.
    #[error("{0}")]
    Server(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Session storage error: {0}")]
    Storage(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait AuthService: Send + Sync {
    /// Asks the backend to email a one-time verification code.
    async fn send_code(&self, email: &str) -> PortResult<()>;

    /// Exchanges an emailed code for a session token.
    async fn verify_code(&self, email: &str, code: &str) -> PortResult<SessionToken>;

    /// Returns `false` when the backend no longer accepts the token.
    async fn check_token(&self, token: &SessionToken) -> PortResult<bool>;

    async fn fetch_usage(&self, token: &SessionToken) -> PortResult<UsageCounters>;
}

#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Uploads one document and waits for the full analysis.
    async fn analyze(
        &self,
        upload: &Upload,
        state: UsState,
        token: Option<&SessionToken>,
    ) -> PortResult<AnalysisResult>;
}

#[async_trait]
pub trait BillingService: Send + Sync {
    /// Returns the hosted checkout URL the user should be sent to.
    async fn create_checkout(&self, token: Option<&SessionToken>) -> PortResult<String>;
}

#[async_trait]
pub trait ShareService: Send + Sync {
    async fn share_results(
        &self,
        token: Option<&SessionToken>,
        recipient_email: &str,
        results_html: &str,
    ) -> PortResult<()>;
}

/// Persistent storage for the single cached session token.
pub trait SessionStore: Send + Sync {
    fn load_token(&self) -> PortResult<Option<SessionToken>>;
    fn save_token(&self, token: &SessionToken) -> PortResult<()>;
    fn clear_token(&self) -> PortResult<()>;
}
