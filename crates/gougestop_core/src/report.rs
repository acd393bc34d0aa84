//! crates/gougestop_core/src/report.rs
//!
//! Presentation-level views over an `AnalysisResult`, and the self-contained
//! HTML fragment emailed by the share action.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::domain::{AlertLevel, AnalysisResult, CoverageAlert};
use crate::format::{currency, signed_percent};

/// Number of coverage alerts at each level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlertCounts {
    pub ok: usize,
    pub info: usize,
    pub warning: usize,
    pub flag: usize,
}

/// The summary banner shown above the breakdown when coverage was checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageBanner {
    pub has_flags: bool,
    pub headline: String,
    pub detail: String,
}

/// Derived, display-only values for one result.
pub struct ResultsView<'a> {
    result: &'a AnalysisResult,
    alerts_by_cpt: HashMap<&'a str, &'a CoverageAlert>,
}

impl<'a> ResultsView<'a> {
    pub fn new(result: &'a AnalysisResult) -> Self {
        // A later alert for the same code replaces an earlier one.
        let alerts_by_cpt = result
            .coverage_alerts
            .iter()
            .map(|alert| (alert.cpt_code.as_str(), alert))
            .collect();
        Self {
            result,
            alerts_by_cpt,
        }
    }

    pub fn result(&self) -> &'a AnalysisResult {
        self.result
    }

    pub fn document_label(&self) -> &'static str {
        self.result.document_type.label()
    }

    pub fn has_bill_data(&self) -> bool {
        self.result.document_type.has_charges()
    }

    pub fn alert_for(&self, cpt_code: &str) -> Option<&'a CoverageAlert> {
        self.alerts_by_cpt.get(cpt_code).copied()
    }

    pub fn alert_counts(&self) -> AlertCounts {
        let mut counts = AlertCounts::default();
        for alert in &self.result.coverage_alerts {
            match alert.level {
                AlertLevel::Ok => counts.ok += 1,
                AlertLevel::Info => counts.info += 1,
                AlertLevel::Warning => counts.warning += 1,
                AlertLevel::Flag => counts.flag += 1,
            }
        }
        counts
    }

    pub fn flagged_alerts(&self) -> impl Iterator<Item = &'a CoverageAlert> {
        self.result
            .coverage_alerts
            .iter()
            .filter(|alert| alert.level == AlertLevel::Flag)
    }

    /// `None` when the backend ran no coverage check.
    pub fn coverage_banner(&self) -> Option<CoverageBanner> {
        let checked = self.result.coverage_alerts.len();
        if checked == 0 {
            return None;
        }
        let flags = self.alert_counts().flag;
        let banner = if flags > 0 {
            CoverageBanner {
                has_flags: true,
                headline: format!("{} Coverage Alert{} Found", flags, plural(flags)),
                detail: "Some tests may have coverage concerns. See details below.".to_string(),
            }
        } else {
            CoverageBanner {
                has_flags: false,
                headline: "No Coverage Issues Detected".to_string(),
                detail: format!(
                    "{} test{} checked against Medicare NCD rules.",
                    checked,
                    plural(checked)
                ),
            }
        };
        Some(banner)
    }

    /// Provider charges are only shown for bills and ABNs, and only when non-zero.
    pub fn shows_provider_total(&self) -> bool {
        self.has_bill_data()
            && self
                .result
                .total_provider_charges
                .is_some_and(|total| total != 0.0)
    }

    pub fn shows_markup_total(&self) -> bool {
        self.has_bill_data() && self.result.total_markup.is_some()
    }

    /// "Provider Name · 2026-01-05", if either part is known.
    pub fn provider_line(&self) -> Option<String> {
        match (&self.result.provider_name, &self.result.date_of_service) {
            (Some(name), Some(date)) => Some(format!("{} \u{00B7} {}", name, date)),
            (Some(name), None) => Some(name.clone()),
            (None, Some(date)) => Some(date.clone()),
            (None, None) => None,
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

//=========================================================================================
// Share email
//=========================================================================================

/// Escapes text from the backend before it is placed in the email body.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

const CELL: &str = "padding:8px 4px;";
const BOX_LABEL: &str =
    "font-size:11px;font-weight:600;color:#495057;text-transform:uppercase;";

/// Builds the HTML fragment mirroring the on-screen summary.
pub fn share_html(result: &AnalysisResult) -> String {
    let view = ResultsView::new(result);
    let has_bill_data = view.has_bill_data();
    let mut html = String::new();

    html.push_str(
        "<h2 style=\"color:#1B3A5C;font-size:20px;margin-bottom:12px;\">Your GougeStop Results</h2>",
    );

    if let Some(line) = view.provider_line() {
        let _ = write!(
            html,
            "<p style=\"color:#6c757d;font-size:14px;margin-bottom:16px;\">{} ({})</p>",
            escape_html(&line),
            view.document_label()
        );
    }

    html.push_str("<div style=\"display:flex;gap:12px;flex-wrap:wrap;margin-bottom:20px;\">");
    push_total_box(
        &mut html,
        "#d4edda",
        "#28a745",
        "Medicare Allows",
        &currency(result.total_medicare_allowed),
    );
    if view.shows_provider_total() {
        push_total_box(
            &mut html,
            "#f8d7da",
            "#dc3545",
            "Provider Charged",
            &currency(result.total_provider_charges),
        );
    }
    html.push_str("</div>");

    if view.shows_markup_total() {
        html.push_str(
            "<div style=\"background:#ffecd2;border-radius:8px;padding:12px;text-align:center;margin-bottom:20px;\">",
        );
        let _ = write!(
            html,
            "<div style=\"{}\">Premium Above Medicare Rate</div>\
             <div style=\"font-size:22px;font-weight:700;color:#e67e22;\">{}</div>",
            BOX_LABEL,
            currency(result.total_markup)
        );
        if result.average_markup_percent.is_some() {
            let _ = write!(
                html,
                "<div style=\"font-size:12px;color:#6c757d;\">Average premium: {}</div>",
                signed_percent(result.average_markup_percent)
            );
        }
        html.push_str("</div>");
    }

    html.push_str(
        "<h3 style=\"color:#1B3A5C;font-size:16px;margin-bottom:12px;\">Test-by-Test Breakdown</h3>",
    );
    html.push_str("<table style=\"width:100%;border-collapse:collapse;font-size:14px;\">");
    let _ = write!(
        html,
        "<tr style=\"border-bottom:2px solid #dee2e6;\"><th style=\"text-align:left;{c}\">Test</th>\
         <th style=\"text-align:right;{c}\">Medicare</th>",
        c = CELL
    );
    if has_bill_data {
        let _ = write!(html, "<th style=\"text-align:right;{}\">Charged</th>", CELL);
    }
    html.push_str("</tr>");

    for item in &result.items {
        let _ = write!(
            html,
            "<tr style=\"border-bottom:1px solid #e9ecef;\">\
             <td style=\"{c}\"><strong>{}</strong> {}</td>\
             <td style=\"text-align:right;{c}color:#28a745;font-weight:600;\">{}</td>",
            escape_html(&item.cpt_code),
            escape_html(item.test_description.as_deref().unwrap_or("")),
            currency(item.medicare_allowed),
            c = CELL
        );
        if has_bill_data {
            let charged = match item.provider_charge {
                Some(_) => currency(item.provider_charge),
                None => "\u{2014}".to_string(),
            };
            let _ = write!(
                html,
                "<td style=\"text-align:right;{}color:#dc3545;font-weight:600;\">{}</td>",
                CELL, charged
            );
        }
        html.push_str("</tr>");
    }
    html.push_str("</table>");

    let flags: Vec<&CoverageAlert> = view.flagged_alerts().collect();
    if !flags.is_empty() {
        let _ = write!(
            html,
            "<div style=\"margin-top:20px;padding:16px;background:#fff3cd;border-radius:8px;border-left:4px solid #ffc107;\">\
             <strong style=\"color:#856404;\">Coverage Alerts ({})</strong>",
            flags.len()
        );
        for alert in flags {
            let _ = write!(
                html,
                "<p style=\"margin:8px 0 0;font-size:13px;color:#856404;\"><strong>{}</strong>: {}</p>",
                escape_html(&alert.cpt_code),
                escape_html(&alert.title)
            );
        }
        html.push_str("</div>");
    }

    html
}

fn push_total_box(html: &mut String, background: &str, color: &str, label: &str, value: &str) {
    let _ = write!(
        html,
        "<div style=\"flex:1;min-width:120px;background:{};border-radius:8px;padding:12px;text-align:center;\">\
         <div style=\"{}\">{}</div>\
         <div style=\"font-size:22px;font-weight:700;color:{};\">{}</div></div>",
        background, BOX_LABEL, label, color, value
    );
}
