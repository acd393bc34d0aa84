//! services/client/src/adapters/http.rs
//!
//! This module contains the adapter for the remote analysis backend.
//! It implements the `AuthService`, `AnalysisService`, `BillingService` and
//! `ShareService` ports from the `core` crate over HTTP with `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use gougestop_core::domain::{
    AlertLevel, AnalysisResult, CoverageAlert, DocumentType, FrequencyLimit, LabCharge, LineItem,
    NearbyLab, SessionToken, UsState, Upload, UsageCounters,
};
use gougestop_core::flow::SHARE_FAILED_MESSAGE;
use gougestop_core::ports::{
    AnalysisService, AuthService, BillingService, PortError, PortResult, ShareService,
};
use reqwest::{
    multipart::{Form, Part},
    Response, StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

const ANALYSIS_FAILED: &str = "Analysis failed. Please try again.";
const SESSION_EXPIRED: &str = "Your session has expired. Please sign in again.";
const INVALID_CODE: &str = "Invalid or expired code.";
const SEND_CODE_FAILED: &str = "Could not send a code to that address.";
const CHECKOUT_FAILED: &str = "Could not start checkout. Please try again.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the backend ports against the GougeStop HTTP API.
#[derive(Clone)]
pub struct HttpBackendAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackendAdapter {
    /// Creates a new `HttpBackendAdapter` for the given base URL.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> PortResult<Response> {
        debug!("POST {}", path);
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(network_error)
    }
}

// The transport error is mapped by hand, which respects the orphan rule.
fn network_error(e: reqwest::Error) -> PortError {
    warn!("Request to the backend failed: {}", e);
    PortError::Network(e.to_string())
}

async fn read_json<T: DeserializeOwned>(response: Response) -> PortResult<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| PortError::Server(format!("Unexpected response from server: {}", e)))
}

/// Pulls the backend's explanation out of an error body, if it sent one.
async fn error_message(response: Response) -> Option<String> {
    response.json::<StatusBody>().await.ok()?.message()
}

//=========================================================================================
// Wire Records
//=========================================================================================

#[derive(Serialize)]
struct EmailRequest<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    email: &'a str,
    code: &'a str,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    token: &'a str,
}

#[derive(Serialize)]
struct ShareRequest<'a> {
    token: &'a str,
    recipient_email: &'a str,
    results_html: &'a str,
}

/// Success flag plus the two places the backend puts error text.
#[derive(Deserialize, Default)]
struct StatusBody {
    success: Option<bool>,
    detail: Option<Value>,
    error: Option<String>,
}

impl StatusBody {
    fn message(self) -> Option<String> {
        match self.detail {
            Some(Value::String(detail)) if !detail.is_empty() => Some(detail),
            _ => self.error.filter(|e| !e.is_empty()),
        }
    }
}

#[derive(Deserialize)]
struct VerifyRecord {
    token: Option<String>,
}

#[derive(Deserialize)]
struct ValidityRecord {
    #[serde(default)]
    valid: bool,
}

#[derive(Deserialize)]
struct UsageRecord {
    scans_remaining: Option<u32>,
    is_paid: Option<bool>,
}

#[derive(Deserialize)]
struct CheckoutRecord {
    checkout_url: Option<String>,
}

#[derive(Deserialize)]
struct AnalyzeRecord {
    #[serde(default)]
    success: bool,
    error: Option<String>,
    document_type: Option<String>,
    provider_name: Option<String>,
    date_of_service: Option<String>,
    items: Option<Vec<LineItemRecord>>,
    total_medicare_allowed: Option<f64>,
    total_provider_charges: Option<f64>,
    total_markup: Option<f64>,
    average_markup_percent: Option<f64>,
    coverage_alerts: Option<Vec<CoverageAlertRecord>>,
    diagnosis_codes_found: Option<Vec<String>>,
    nearby_labs: Option<Vec<NearbyLabRecord>>,
    data_disclaimer: Option<String>,
    coverage_disclaimer: Option<String>,
}

impl AnalyzeRecord {
    fn into_domain(self) -> PortResult<AnalysisResult> {
        if !self.success {
            let message = self
                .error
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| ANALYSIS_FAILED.to_string());
            return Err(PortError::Server(message));
        }

        Ok(AnalysisResult {
            document_type: DocumentType::from_code(self.document_type.as_deref().unwrap_or("")),
            provider_name: self.provider_name,
            date_of_service: self.date_of_service,
            items: self
                .items
                .unwrap_or_default()
                .into_iter()
                .map(LineItemRecord::into_domain)
                .collect(),
            total_medicare_allowed: self.total_medicare_allowed,
            total_provider_charges: self.total_provider_charges,
            total_markup: self.total_markup,
            average_markup_percent: self.average_markup_percent,
            coverage_alerts: self
                .coverage_alerts
                .unwrap_or_default()
                .into_iter()
                .map(CoverageAlertRecord::into_domain)
                .collect(),
            diagnosis_codes_found: self.diagnosis_codes_found.unwrap_or_default(),
            nearby_labs: self
                .nearby_labs
                .unwrap_or_default()
                .into_iter()
                .map(NearbyLabRecord::into_domain)
                .collect(),
            data_disclaimer: self.data_disclaimer.unwrap_or_default(),
            coverage_disclaimer: self.coverage_disclaimer,
        })
    }
}

#[derive(Deserialize)]
struct LineItemRecord {
    cpt_code: Option<String>,
    test_description: Option<String>,
    medicare_description: Option<String>,
    medicare_allowed: Option<f64>,
    provider_charge: Option<f64>,
    markup_dollars: Option<f64>,
    markup_percent: Option<f64>,
}

impl LineItemRecord {
    fn into_domain(self) -> LineItem {
        LineItem {
            cpt_code: self.cpt_code.unwrap_or_default(),
            test_description: self.test_description,
            medicare_description: self.medicare_description,
            medicare_allowed: self.medicare_allowed,
            provider_charge: self.provider_charge,
            markup_dollars: self.markup_dollars,
            markup_percent: self.markup_percent,
        }
    }
}

#[derive(Deserialize)]
struct FrequencyLimitRecord {
    limit: Option<u32>,
    period: Option<String>,
    source: Option<String>,
}

#[derive(Deserialize)]
struct CoverageAlertRecord {
    cpt_code: Option<String>,
    alert_level: Option<String>,
    alert_title: Option<String>,
    alert_detail: Option<String>,
    denial_rate: Option<f64>,
    frequency_limit: Option<FrequencyLimitRecord>,
    matched_codes: Option<Vec<String>>,
    unmatched_codes: Option<Vec<String>>,
    ncd_code: Option<String>,
    ncd_name: Option<String>,
}

impl CoverageAlertRecord {
    fn into_domain(self) -> CoverageAlert {
        CoverageAlert {
            cpt_code: self.cpt_code.unwrap_or_default(),
            level: AlertLevel::from_code(self.alert_level.as_deref().unwrap_or("")),
            title: self.alert_title.unwrap_or_default(),
            detail: self.alert_detail,
            denial_rate: self.denial_rate,
            // A limit is only shown when both its count and period are known.
            frequency_limit: self.frequency_limit.and_then(|f| {
                Some(FrequencyLimit {
                    limit: f.limit?,
                    period: f.period.filter(|p| !p.is_empty())?,
                    source: f.source,
                })
            }),
            matched_codes: self.matched_codes.unwrap_or_default(),
            unmatched_codes: self.unmatched_codes.unwrap_or_default(),
            ncd_code: self.ncd_code,
            ncd_name: self.ncd_name,
        }
    }
}

#[derive(Deserialize)]
struct LabChargeRecord {
    description: Option<String>,
    charge: Option<f64>,
}

#[derive(Deserialize)]
struct NearbyLabRecord {
    provider_name: Option<String>,
    provider_city: Option<String>,
    estimated_total: Option<f64>,
    codes_priced: Option<u32>,
    codes_requested: Option<u32>,
    charges_by_code: Option<Map<String, Value>>,
}

impl NearbyLabRecord {
    fn into_domain(self) -> NearbyLab {
        let charges = self
            .charges_by_code
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(cpt_code, info)| {
                match serde_json::from_value::<LabChargeRecord>(info) {
                    Ok(record) => Some(LabCharge {
                        cpt_code,
                        description: record.description,
                        charge: record.charge,
                    }),
                    Err(e) => {
                        warn!("Skipping unreadable lab charge for {}: {}", cpt_code, e);
                        None
                    }
                }
            })
            .collect();

        NearbyLab {
            provider_name: self.provider_name.unwrap_or_default(),
            provider_city: self.provider_city,
            estimated_total: self.estimated_total,
            codes_priced: self.codes_priced.unwrap_or(0),
            codes_requested: self.codes_requested.unwrap_or(0),
            charges,
        }
    }
}

//=========================================================================================
// Port Implementations
//=========================================================================================

#[async_trait]
impl AuthService for HttpBackendAdapter {
    async fn send_code(&self, email: &str) -> PortResult<()> {
        let response = self.post_json("/auth/send-code", &EmailRequest { email }).await?;
        if response.status().is_success() {
            return Ok(());
        }
        let message = error_message(response)
            .await
            .unwrap_or_else(|| SEND_CODE_FAILED.to_string());
        Err(PortError::Validation(message))
    }

    async fn verify_code(&self, email: &str, code: &str) -> PortResult<SessionToken> {
        let response = self
            .post_json("/auth/verify-code", &VerifyRequest { email, code })
            .await?;
        let status = response.status();
        if status.is_client_error() {
            let message = error_message(response)
                .await
                .unwrap_or_else(|| INVALID_CODE.to_string());
            return Err(PortError::Auth(message));
        }
        if !status.is_success() {
            let message = error_message(response)
                .await
                .unwrap_or_else(|| format!("Server error: {}", status.as_u16()));
            return Err(PortError::Server(message));
        }
        let record: VerifyRecord = read_json(response).await?;
        record
            .token
            .filter(|t| !t.is_empty())
            .map(SessionToken::new)
            .ok_or_else(|| PortError::Auth(INVALID_CODE.to_string()))
    }

    async fn check_token(&self, token: &SessionToken) -> PortResult<bool> {
        let response = self
            .post_json("/auth/check-token", &TokenRequest { token: token.as_str() })
            .await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Ok(false);
        }
        if !status.is_success() {
            return Err(PortError::Server(format!("Server error: {}", status.as_u16())));
        }
        let record: ValidityRecord = read_json(response).await?;
        Ok(record.valid)
    }

    async fn fetch_usage(&self, token: &SessionToken) -> PortResult<UsageCounters> {
        let response = self
            .post_json("/auth/usage", &TokenRequest { token: token.as_str() })
            .await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(PortError::Auth(SESSION_EXPIRED.to_string()));
        }
        if !status.is_success() {
            let message = error_message(response)
                .await
                .unwrap_or_else(|| format!("Server error: {}", status.as_u16()));
            return Err(PortError::Server(message));
        }
        let record: UsageRecord = read_json(response).await?;
        Ok(UsageCounters {
            scans_remaining: record.scans_remaining.unwrap_or(0),
            is_paid: record.is_paid.unwrap_or(false),
        })
    }
}

#[async_trait]
impl AnalysisService for HttpBackendAdapter {
    async fn analyze(
        &self,
        upload: &Upload,
        state: UsState,
        token: Option<&SessionToken>,
    ) -> PortResult<AnalysisResult> {
        let part = Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str(&upload.content_type)
            .map_err(|e| {
                PortError::Validation(format!(
                    "Unsupported content type '{}': {}",
                    upload.content_type, e
                ))
            })?;
        let form = Form::new().part("file", part);

        let mut query = vec![("state", state.code())];
        if let Some(token) = token {
            query.push(("token", token.as_str()));
        }

        debug!("POST /analyze ({} bytes, state {})", upload.bytes.len(), state);
        let response = self
            .client
            .post(self.url("/analyze"))
            .query(&query)
            .multipart(form)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            // The body is irrelevant: 403 always means the free scans are used up.
            return Err(PortError::LimitReached);
        }
        if status == StatusCode::UNAUTHORIZED {
            let message = error_message(response)
                .await
                .unwrap_or_else(|| SESSION_EXPIRED.to_string());
            return Err(PortError::Auth(message));
        }
        if !status.is_success() {
            let message = error_message(response)
                .await
                .unwrap_or_else(|| format!("Server error: {}", status.as_u16()));
            return Err(PortError::Server(message));
        }

        let record: AnalyzeRecord = read_json(response).await?;
        record.into_domain()
    }
}

#[async_trait]
impl BillingService for HttpBackendAdapter {
    async fn create_checkout(&self, token: Option<&SessionToken>) -> PortResult<String> {
        let token = token.map(SessionToken::as_str).unwrap_or("");
        let response = self
            .post_json("/stripe/create-checkout", &TokenRequest { token })
            .await?;
        if !response.status().is_success() {
            let message = error_message(response)
                .await
                .unwrap_or_else(|| CHECKOUT_FAILED.to_string());
            return Err(PortError::Server(message));
        }
        let record: CheckoutRecord = read_json(response).await?;
        record
            .checkout_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| PortError::Server(CHECKOUT_FAILED.to_string()))
    }
}

#[async_trait]
impl ShareService for HttpBackendAdapter {
    async fn share_results(
        &self,
        token: Option<&SessionToken>,
        recipient_email: &str,
        results_html: &str,
    ) -> PortResult<()> {
        let request = ShareRequest {
            token: token.map(SessionToken::as_str).unwrap_or(""),
            recipient_email,
            results_html,
        };
        let response = self.post_json("/share-results", &request).await?;
        let ok = response.status().is_success();
        let body = response.json::<StatusBody>().await.unwrap_or_default();

        if ok && body.success == Some(true) {
            return Ok(());
        }
        let message = body
            .message()
            .unwrap_or_else(|| SHARE_FAILED_MESSAGE.to_string());
        Err(PortError::Server(message))
    }
}
