//! crates/gougestop_core/src/domain.rs
//!
//! Defines the pure, core data structures for the client.
//! These structs are independent of the backend's JSON wire format; the HTTP
//! adapter maps its records into them.

use std::fmt;

/// An opaque session token issued by the backend after email verification.
///
/// `Debug` is redacted so the token never ends up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

/// Every code the state selector offers: the 50 states plus DC and PR.
pub const US_STATES: [&str; 52] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ",
    "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT",
    "VA", "WA", "WV", "WI", "WY", "DC", "PR",
];

/// A validated two-letter US state code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsState(&'static str);

impl UsState {
    /// Parses a state code, ignoring case and surrounding whitespace.
    pub fn parse(code: &str) -> Option<Self> {
        let wanted = code.trim().to_ascii_uppercase();
        US_STATES
            .iter()
            .find(|candidate| **candidate == wanted)
            .map(|candidate| UsState(*candidate))
    }

    pub fn code(&self) -> &'static str {
        self.0
    }
}

impl Default for UsState {
    fn default() -> Self {
        UsState("TX")
    }
}

impl fmt::Display for UsState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// A photo or PDF of a lab document, held in memory until it is submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// What the capture screen can show about an upload without asking the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPreview {
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: usize,
    pub kind: PreviewKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewKind {
    Image,
    Pdf,
    Other,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn preview(&self) -> UploadPreview {
        let kind = if self.content_type == "application/pdf" {
            PreviewKind::Pdf
        } else if self.content_type.starts_with("image/") {
            PreviewKind::Image
        } else {
            PreviewKind::Other
        };
        UploadPreview {
            file_name: self.file_name.clone(),
            content_type: self.content_type.clone(),
            size_bytes: self.bytes.len(),
            kind,
        }
    }
}

/// The kind of document the backend recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentType {
    Bill,
    Order,
    Abn,
    Other,
}

impl DocumentType {
    pub fn from_code(code: &str) -> Self {
        match code {
            "bill" => DocumentType::Bill,
            "order" => DocumentType::Order,
            "abn" => DocumentType::Abn,
            _ => DocumentType::Other,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DocumentType::Bill => "Bill",
            DocumentType::Order => "Order",
            DocumentType::Abn => "ABN",
            DocumentType::Other => "Document",
        }
    }

    /// Bills and ABNs carry provider charges; orders only list tests.
    pub fn has_charges(&self) -> bool {
        matches!(self, DocumentType::Bill | DocumentType::Abn)
    }
}

/// One test found on the document, priced against the Medicare fee schedule.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LineItem {
    pub cpt_code: String,
    pub test_description: Option<String>,
    pub medicare_description: Option<String>,
    pub medicare_allowed: Option<f64>,
    pub provider_charge: Option<f64>,
    pub markup_dollars: Option<f64>,
    pub markup_percent: Option<f64>,
}

/// Severity of a coverage alert. Unknown levels from the backend read as `Info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertLevel {
    Ok,
    Info,
    Warning,
    Flag,
}

impl AlertLevel {
    pub fn from_code(code: &str) -> Self {
        match code {
            "ok" => AlertLevel::Ok,
            "warning" => AlertLevel::Warning,
            "flag" => AlertLevel::Flag,
            _ => AlertLevel::Info,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            AlertLevel::Ok => "\u{2705}",
            AlertLevel::Info => "\u{2139}\u{FE0F}",
            AlertLevel::Warning => "\u{26A0}\u{FE0F}",
            AlertLevel::Flag => "\u{1F6A9}",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyLimit {
    pub limit: u32,
    pub period: String,
    pub source: Option<String>,
}

/// A coverage or frequency finding for a single test code.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageAlert {
    pub cpt_code: String,
    pub level: AlertLevel,
    pub title: String,
    pub detail: Option<String>,
    pub denial_rate: Option<f64>,
    pub frequency_limit: Option<FrequencyLimit>,
    pub matched_codes: Vec<String>,
    pub unmatched_codes: Vec<String>,
    pub ncd_code: Option<String>,
    pub ncd_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabCharge {
    pub cpt_code: String,
    pub description: Option<String>,
    pub charge: Option<f64>,
}

/// A lab near the user with its historical charges for the same tests.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyLab {
    pub provider_name: String,
    pub provider_city: Option<String>,
    pub estimated_total: Option<f64>,
    pub codes_priced: u32,
    pub codes_requested: u32,
    /// Kept in the order the backend sent them.
    pub charges: Vec<LabCharge>,
}

/// The backend's analysis of one submitted document.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub document_type: DocumentType,
    pub provider_name: Option<String>,
    pub date_of_service: Option<String>,
    pub items: Vec<LineItem>,
    pub total_medicare_allowed: Option<f64>,
    pub total_provider_charges: Option<f64>,
    pub total_markup: Option<f64>,
    pub average_markup_percent: Option<f64>,
    pub coverage_alerts: Vec<CoverageAlert>,
    pub diagnosis_codes_found: Vec<String>,
    pub nearby_labs: Vec<NearbyLab>,
    pub data_disclaimer: String,
    pub coverage_disclaimer: Option<String>,
}

/// Remaining free scans and paid status. The backend owns the real numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UsageCounters {
    pub scans_remaining: u32,
    pub is_paid: bool,
}

impl UsageCounters {
    /// Optimistic local bookkeeping after a successful scan.
    pub fn record_scan(&mut self) {
        if !self.is_paid {
            self.scans_remaining = self.scans_remaining.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_codes_parse_case_insensitively() {
        assert_eq!(UsState::parse(" ny ").map(|s| s.code()), Some("NY"));
        assert_eq!(UsState::parse("pr").map(|s| s.code()), Some("PR"));
        assert!(UsState::parse("XX").is_none());
        assert!(UsState::parse("").is_none());
        assert_eq!(UsState::default().code(), "TX");
    }

    #[test]
    fn preview_kind_follows_content_type() {
        let pdf = Upload::new("bill.pdf", "application/pdf", vec![1, 2, 3]);
        let photo = Upload::new("bill.jpg", "image/jpeg", vec![]);
        let other = Upload::new("bill.bin", "application/octet-stream", vec![]);

        assert_eq!(pdf.preview().kind, PreviewKind::Pdf);
        assert_eq!(pdf.preview().size_bytes, 3);
        assert_eq!(photo.preview().kind, PreviewKind::Image);
        assert_eq!(other.preview().kind, PreviewKind::Other);
    }

    #[test]
    fn only_bills_and_abns_carry_charges() {
        assert!(DocumentType::from_code("bill").has_charges());
        assert!(DocumentType::from_code("abn").has_charges());
        assert!(!DocumentType::from_code("order").has_charges());
        assert_eq!(DocumentType::from_code("receipt").label(), "Document");
    }

    #[test]
    fn usage_decrement_saturates_and_skips_paid_accounts() {
        let mut free = UsageCounters { scans_remaining: 1, is_paid: false };
        free.record_scan();
        free.record_scan();
        assert_eq!(free.scans_remaining, 0);

        let mut paid = UsageCounters { scans_remaining: 5, is_paid: true };
        paid.record_scan();
        assert_eq!(paid.scans_remaining, 5);
    }

    #[test]
    fn token_debug_is_redacted() {
        let token = SessionToken::new("secret-value");
        assert_eq!(format!("{:?}", token), "SessionToken(***)");
        assert_eq!(token.as_str(), "secret-value");
    }
}
