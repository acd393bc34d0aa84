//! services/client/src/cli/args.rs
//!
//! Command-line arguments for the `gougestop` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "gougestop")]
#[command(about = "Check lab bills, orders and ABNs against Medicare rates")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in with a one-time code sent to your email
    Login {
        email: String,
    },

    /// Analyze a photo or PDF of a lab document
    Scan {
        /// Image or PDF to upload
        file: PathBuf,

        /// Two-letter state used for nearby lab pricing
        #[arg(short, long)]
        state: Option<String>,

        /// Beta invite code, used when no session is stored
        #[arg(long)]
        invite: Option<String>,

        /// Email the results to this address afterwards
        #[arg(long)]
        share: Option<String>,
    },

    /// Show remaining free scans
    Usage,

    /// Print a checkout link to upgrade to unlimited scans
    Upgrade,

    /// Forget the stored session
    Logout,

    /// Record a completed checkout from the return URL's query string
    PaymentReturn {
        query: String,
    },

    /// Show how the web shell's offline cache would serve a request
    CacheRoute {
        url: String,

        /// Treat the request as a page navigation
        #[arg(long)]
        navigation: bool,

        #[arg(long, default_value = "GET")]
        method: String,
    },
}
