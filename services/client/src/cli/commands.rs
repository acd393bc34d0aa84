//! services/client/src/cli/commands.rs
//!
//! Drives the scan flow for each subcommand.

use std::path::Path;
use std::sync::Arc;

use gougestop_core::domain::Upload;
use gougestop_core::flow::{FlowError, FlowPorts, ScanFlow, Screen};
use gougestop_core::offline::{CachePolicy, FetchRequest, FetchStrategy};
use gougestop_core::ports::PortError;
use gougestop_core::progress::ProgressTicker;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use crate::cli::args::Command;
use crate::cli::render;
use crate::config::Config;
use crate::error::ClientError;

const NOT_SIGNED_IN: &str =
    "Not signed in. Run `gougestop login <email>` or pass --invite <code>.";
const SESSION_EXPIRED: &str = "Your session has expired. Run `gougestop login <email>` again.";

/// Runs one subcommand to completion.
pub async fn run(command: Command, config: Arc<Config>, ports: FlowPorts) -> Result<(), ClientError> {
    let mut flow = ScanFlow::new(ports, config.default_state);

    match command {
        Command::Login { email } => login(&mut flow, &email).await,
        Command::Scan {
            file,
            state,
            invite,
            share,
        } => {
            scan(
                &mut flow,
                &config,
                &file,
                state.as_deref(),
                invite.as_deref(),
                share.as_deref(),
            )
            .await
        }
        Command::Usage => {
            require_session(&mut flow).await?;
            println!("{}", render::usage(flow.usage()));
            Ok(())
        }
        Command::Upgrade => {
            require_session(&mut flow).await?;
            let url = flow.start_checkout().await?;
            println!("Open this link to upgrade:\n{}", url);
            Ok(())
        }
        Command::Logout => {
            flow.sign_out()?;
            println!("Signed out.");
            Ok(())
        }
        Command::PaymentReturn { query } => {
            require_session(&mut flow).await?;
            let remaining = flow.acknowledge_payment(&query);
            if flow.usage().is_some_and(|u| u.is_paid) {
                match flow.refresh_usage().await {
                    Ok(Some(usage)) if !usage.is_paid => {
                        // The webhook has not landed yet; the return URL is proof enough for now.
                        flow.acknowledge_payment("payment=success");
                    }
                    Ok(_) => {}
                    Err(FlowError::Port(PortError::Auth(_))) => {
                        return Err(ClientError::NotCompleted(SESSION_EXPIRED.to_string()));
                    }
                    Err(e) => warn!("Could not refresh usage after checkout: {}", e),
                }
                println!("Payment received. {}", render::usage(flow.usage()));
            }
            if !remaining.is_empty() {
                println!("Remaining query: {}", remaining);
            }
            Ok(())
        }
        Command::CacheRoute {
            url,
            navigation,
            method,
        } => {
            let policy = CachePolicy::new(config.api_host());
            let request = FetchRequest {
                method: &method,
                url: &url,
                is_navigation: navigation,
            };
            println!("{}", describe_route(&policy, &request));
            Ok(())
        }
    }
}

fn describe_route(policy: &CachePolicy, request: &FetchRequest<'_>) -> String {
    let strategy = policy.strategy(request);
    let how = match strategy {
        FetchStrategy::Bypass => "bypass: always fetched from the network, never cached",
        FetchStrategy::NetworkFirst => {
            "network-first: falls back to the cached copy, then the offline page"
        }
        FetchStrategy::CacheFirst => "cache-first: successful responses are stored",
    };
    format!("{} {} -> {} ({})", request.method, request.url, how, policy.cache_name())
}

async fn require_session(flow: &mut ScanFlow) -> Result<(), ClientError> {
    flow.resume_session().await?;
    if flow.has_access() {
        Ok(())
    } else {
        Err(ClientError::NotCompleted(NOT_SIGNED_IN.to_string()))
    }
}

async fn login(flow: &mut ScanFlow, email: &str) -> Result<(), ClientError> {
    flow.resume_session().await?;
    if flow.has_access() {
        println!("Already signed in. {}", render::usage(flow.usage()));
        return Ok(());
    }

    flow.request_code(email).await?;
    let code = prompt(&format!("Enter the code sent to {}: ", email.trim())).await?;
    flow.verify_code(&code).await?;
    println!("Signed in. {}", render::usage(flow.usage()));
    Ok(())
}

async fn prompt(question: &str) -> Result<String, ClientError> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(question.as_bytes()).await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(line.trim().to_string())
}

async fn scan(
    flow: &mut ScanFlow,
    config: &Config,
    file: &Path,
    state: Option<&str>,
    invite: Option<&str>,
    share: Option<&str>,
) -> Result<(), ClientError> {
    // --- 1. Access ---
    flow.resume_session().await?;
    if !flow.has_access() {
        match invite {
            Some(code) => flow.redeem_invite(code)?,
            None => return Err(ClientError::NotCompleted(NOT_SIGNED_IN.to_string())),
        }
    }

    // --- 2. Capture ---
    if let Some(state) = state {
        flow.select_state(state)?;
    }
    let upload = load_upload(file).await?;
    println!("{}", render::preview(&upload.preview()));
    flow.attach_file(upload)?;

    // --- 3. Submit, with the cosmetic progress steps on stderr ---
    println!("Analyzing your document for {}...", flow.selected_state());
    let ticker = ProgressTicker::start(config.progress_step);
    let mut updates = ticker.subscribe();
    eprintln!("{}", render::progress(&ticker.current()));
    let printer = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let progress = *updates.borrow();
            eprintln!("{}", render::progress(&progress));
        }
    });

    let submitted = flow.submit().await.map(|screen| screen.kind());
    ticker.stop().await;
    let _ = printer.await;
    submitted?;

    // --- 4. Outcome ---
    match flow.screen() {
        Screen::Results(result) => {
            println!("{}", render::results(result));
            if let Some(usage) = flow.usage() {
                println!("{}", render::usage(Some(usage)));
            }
            if let Some(recipient) = share {
                let status = flow.share_results(recipient).await?;
                println!("{}", status.message());
            }
            Ok(())
        }
        Screen::Paywall => {
            println!("You've used all of your free scans.");
            let url = flow.start_checkout().await?;
            println!("Upgrade here to keep scanning:\n{}", url);
            Ok(())
        }
        Screen::Error(message) => Err(ClientError::NotCompleted(format!(
            "Something went wrong: {}",
            message
        ))),
        Screen::AccessPending(_) => Err(ClientError::NotCompleted(SESSION_EXPIRED.to_string())),
        other => Err(ClientError::Internal(format!(
            "Unexpected screen after submission: {}",
            other.kind()
        ))),
    }
}

/// Reads a document from disk and guesses its content type from the extension.
pub async fn load_upload(path: &Path) -> Result<Upload, ClientError> {
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let content_type = content_type_for(path);
    info!("Loaded {} ({} bytes, {})", file_name, bytes.len(), content_type);
    Ok(Upload::new(file_name, content_type, bytes))
}

fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "heic" => "image/heic",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types_follow_extensions() {
        assert_eq!(content_type_for(Path::new("bill.JPG")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("abn.pdf")), "application/pdf");
        assert_eq!(content_type_for(Path::new("scan.heic")), "image/heic");
        assert_eq!(content_type_for(Path::new("notes")), "application/octet-stream");
    }

    #[test]
    fn backend_calls_bypass_the_offline_cache() {
        let policy = CachePolicy::new("api.gougestop.test");
        let api = FetchRequest {
            method: "GET",
            url: "https://api.gougestop.test/auth/usage",
            is_navigation: false,
        };
        assert!(describe_route(&policy, &api).contains("-> bypass"));

        let page = FetchRequest {
            method: "GET",
            url: "https://gougestop.com/app",
            is_navigation: true,
        };
        assert_eq!(
            describe_route(&policy, &page),
            "GET https://gougestop.com/app -> network-first: falls back to the cached copy, then the offline page (gougestop-v1)"
        );
    }

    #[tokio::test]
    async fn loads_a_document_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("order.png");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();

        let upload = load_upload(&path).await.unwrap();
        assert_eq!(upload.file_name, "order.png");
        assert_eq!(upload.content_type, "image/png");
        assert_eq!(upload.bytes, vec![1, 2, 3]);
    }
}
