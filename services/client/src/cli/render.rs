//! services/client/src/cli/render.rs
//!
//! Plain-text rendering of each screen for the terminal.

use std::fmt::Write as _;

use gougestop_core::domain::{AlertLevel, AnalysisResult, PreviewKind, UploadPreview, UsageCounters};
use gougestop_core::format::{currency, plain_percent, signed_percent};
use gougestop_core::progress::LoadingProgress;
use gougestop_core::report::ResultsView;

pub fn preview(preview: &UploadPreview) -> String {
    let kind = match preview.kind {
        PreviewKind::Image => "photo",
        PreviewKind::Pdf => "PDF",
        PreviewKind::Other => "file",
    };
    format!(
        "Selected {} {} ({}, {} KB)",
        kind,
        preview.file_name,
        preview.content_type,
        preview.size_bytes.div_ceil(1024)
    )
}

pub fn progress(progress: &LoadingProgress) -> String {
    progress
        .steps()
        .map(|(state, label)| format!("  {} {}", state.marker(), label))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn usage(usage: Option<UsageCounters>) -> String {
    match usage {
        Some(UsageCounters { is_paid: true, .. }) => "Unlimited scans (paid account).".to_string(),
        Some(UsageCounters { scans_remaining, .. }) => format!(
            "{} free scan{} remaining.",
            scans_remaining,
            if scans_remaining == 1 { "" } else { "s" }
        ),
        None => "Usage is not tracked for invite access.".to_string(),
    }
}

pub fn results(result: &AnalysisResult) -> String {
    let view = ResultsView::new(result);
    let mut out = String::new();

    let _ = writeln!(out, "Your Results [{}]", view.document_label());
    if let Some(line) = view.provider_line() {
        let _ = writeln!(out, "{}", line);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "  Medicare Allows:             {}", currency(result.total_medicare_allowed));
    if view.shows_provider_total() {
        let _ = writeln!(out, "  Provider Charged:            {}", currency(result.total_provider_charges));
    }
    if view.shows_markup_total() {
        let _ = writeln!(out, "  Premium Above Medicare Rate: {}", currency(result.total_markup));
        if result.average_markup_percent.is_some() {
            let _ = writeln!(out, "  Average premium:             {}", signed_percent(result.average_markup_percent));
        }
    }
    if !view.has_bill_data() {
        let _ = writeln!(out, "  Tests Found:                 {}", result.items.len());
    }

    if let Some(banner) = view.coverage_banner() {
        let icon = if banner.has_flags { AlertLevel::Flag.icon() } else { AlertLevel::Ok.icon() };
        let _ = writeln!(out, "\n{} {}\n   {}", icon, banner.headline, banner.detail);
    }

    let _ = writeln!(out, "\nTest-by-Test Breakdown");
    for item in &result.items {
        let alert = view.alert_for(&item.cpt_code);
        let mut header = format!("  {}", item.cpt_code);
        if let Some(rate) = alert.and_then(|a| a.denial_rate) {
            let _ = write!(header, "  [{} denial rate]", plain_percent(Some(rate)));
        }
        if item.markup_percent.is_some() {
            let _ = write!(header, "  [{} premium]", signed_percent(item.markup_percent));
        }
        let _ = writeln!(out, "{}", header);

        let description = item.test_description.as_deref().unwrap_or("");
        match item.medicare_description.as_deref() {
            Some(medicare) if medicare != description => {
                let _ = writeln!(out, "    {} \u{2014} {}", description, medicare);
            }
            _ if !description.is_empty() => {
                let _ = writeln!(out, "    {}", description);
            }
            _ => {}
        }

        let mut prices = format!("    Medicare Allows {}", currency(item.medicare_allowed));
        if view.has_bill_data() && item.provider_charge.is_some() {
            let _ = write!(prices, " | Provider Charged {}", currency(item.provider_charge));
        }
        if item.markup_dollars.is_some() {
            let _ = write!(prices, " | Premium {}", currency(item.markup_dollars));
        }
        let _ = writeln!(out, "{}", prices);

        if let Some(alert) = alert.filter(|a| a.level != AlertLevel::Ok) {
            let _ = writeln!(out, "    {} {}", alert.level.icon(), alert.title);
        }
    }

    if !result.coverage_alerts.is_empty() {
        let _ = writeln!(out, "\nCoverage Check Details");
        if !result.diagnosis_codes_found.is_empty() {
            let _ = writeln!(out, "  Diagnosis codes found: {}", result.diagnosis_codes_found.join(", "));
        }
        for alert in &result.coverage_alerts {
            let _ = write!(out, "  {} {}: {}", alert.level.icon(), alert.cpt_code, alert.title);
            if alert.denial_rate.is_some() {
                let _ = write!(out, " ({} denial rate)", plain_percent(alert.denial_rate));
            }
            let _ = writeln!(out);
            if let Some(detail) = &alert.detail {
                let _ = writeln!(out, "      {}", detail);
            }
            if let Some(limit) = &alert.frequency_limit {
                let _ = writeln!(out, "      Frequency limit: {}x per {}", limit.limit, limit.period);
            }
            if !alert.matched_codes.is_empty() {
                let _ = writeln!(out, "      Matching diagnosis codes: {}", alert.matched_codes.join(", "));
            }
            if !alert.unmatched_codes.is_empty() {
                let _ = writeln!(out, "      Non-matching codes: {}", alert.unmatched_codes.join(", "));
            }
            match (&alert.ncd_code, alert.frequency_limit.as_ref().and_then(|f| f.source.as_ref())) {
                (Some(code), _) => {
                    let name = alert.ncd_name.as_deref().unwrap_or("");
                    let _ = writeln!(out, "      NCD Reference: {} ({})", code, name);
                }
                (None, Some(source)) => {
                    let _ = writeln!(out, "      Source: {}", source);
                }
                (None, None) => {}
            }
        }
        if let Some(disclaimer) = &result.coverage_disclaimer {
            let _ = writeln!(out, "  {}", disclaimer);
        }
    }

    if !result.nearby_labs.is_empty() {
        let _ = writeln!(out, "\nNearby Labs \u{2014} Estimated Total");
        for (rank, lab) in result.nearby_labs.iter().enumerate() {
            let city = lab.provider_city.as_deref().map(|c| format!(" ({})", c)).unwrap_or_default();
            let _ = writeln!(
                out,
                "  {}. {}{}  {}  {}/{} tests priced",
                rank + 1,
                lab.provider_name,
                city,
                currency(lab.estimated_total),
                lab.codes_priced,
                lab.codes_requested
            );
            for charge in &lab.charges {
                let description = charge
                    .description
                    .as_deref()
                    .map(|d| format!(" - {}", d))
                    .unwrap_or_default();
                let _ = writeln!(out, "       {}{}  {}", charge.cpt_code, description, currency(charge.charge));
            }
        }
    }

    if !result.data_disclaimer.is_empty() {
        let _ = writeln!(out, "\n{}", result.data_disclaimer);
    }
    out
}
