//! crates/gougestop_core/src/access.rs
//!
//! Input rules for the access gate: invite codes, email addresses and
//! verification codes. Nothing here talks to the backend.

use std::sync::OnceLock;

use regex::Regex;

use crate::ports::{PortError, PortResult};

/// Static codes that open the app without an email round-trip.
pub const DEFAULT_INVITE_CODES: [&str; 3] = ["GOUGESTOP2026", "BETAUSER", "BADGER"];

pub const INVALID_INVITE_MESSAGE: &str = "Invalid access code. Please try again.";

/// The fixed allow-list of invite codes. Stored upper-cased.
#[derive(Debug, Clone)]
pub struct InviteCodes {
    codes: Vec<String>,
}

impl InviteCodes {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            codes: codes
                .into_iter()
                .map(|c| c.as_ref().trim().to_ascii_uppercase())
                .collect(),
        }
    }

    /// Trimmed, case-insensitive membership check.
    pub fn accepts(&self, candidate: &str) -> bool {
        let candidate = candidate.trim().to_ascii_uppercase();
        !candidate.is_empty() && self.codes.iter().any(|c| *c == candidate)
    }
}

impl Default for InviteCodes {
    fn default() -> Self {
        Self::new(DEFAULT_INVITE_CODES)
    }
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"))
}

/// Returns the trimmed address, or a `Validation` error suitable for inline display.
pub fn validate_email(raw: &str) -> PortResult<String> {
    let email = raw.trim();
    if email_pattern().is_match(email) {
        Ok(email.to_string())
    } else {
        Err(PortError::Validation(
            "Please enter a valid email address.".to_string(),
        ))
    }
}

pub fn validate_code(raw: &str) -> PortResult<String> {
    let code = raw.trim();
    if code.is_empty() {
        return Err(PortError::Validation(
            "Please enter the code from your email.".to_string(),
        ));
    }
    Ok(code.to_string())
}
