//! integrity-watch: follow document integrity analysis from the terminal.
//!
//! An external client of the submission service. It uploads documents,
//! streams module results as they arrive and prints the final report.
//!
//! ## Usage
//!
//! ```bash
//! # Upload and follow live
//! integrity-watch submit essay.pdf --modules ai_detection,plagiarism
//!
//! # Follow a submission created elsewhere
//! integrity-watch watch 3f2c9a1e-...
//!
//! # Fetch the report of a finished submission as JSON
//! integrity-watch --json report 3f2c9a1e-...
//! ```

mod app;
mod render;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use integrity_telemetry::{init_logging, TelemetryConfig};
use shared_types::{ModuleId, SubmissionId};

use app::{Output, Overrides};

/// Follow document integrity analysis in real time
#[derive(Parser, Debug)]
#[command(name = "integrity-watch")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Event stream base URL (ws:// or wss://)
    #[arg(long, global = true)]
    ws_url: Option<String>,

    /// REST API base URL, including the version prefix
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Bearer token for the API
    #[arg(long, global = true, env = "INTEGRITY_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a document for analysis
    Submit {
        /// Document to analyse (.txt, .docx, .pdf, .md)
        path: PathBuf,

        /// Analysis modules, comma separated
        #[arg(long, value_delimiter = ',')]
        modules: Vec<ModuleId>,

        /// Assignment the submission belongs to
        #[arg(long)]
        assignment_id: Option<String>,

        /// Print the submission id and exit without following
        #[arg(long)]
        no_follow: bool,
    },

    /// Follow an existing submission until its verdict
    Watch { submission_id: SubmissionId },

    /// Fetch the final report
    Report { submission_id: SubmissionId },

    /// Show processing status
    Status { submission_id: SubmissionId },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&TelemetryConfig::for_binary("integrity-watch").with_verbosity(args.verbose))?;

    let output = if args.json { Output::Json } else { Output::Text };
    let config = app::resolve_config(&Overrides {
        config: args.config,
        ws_url: args.ws_url,
        api_url: args.api_url,
        token: args.token,
    })?;

    match args.command {
        Command::Submit {
            path,
            modules,
            assignment_id,
            no_follow,
        } => app::submit(config, &path, modules, assignment_id, !no_follow, output).await,
        Command::Watch { submission_id } => app::watch(config, submission_id, output).await,
        Command::Report { submission_id } => app::report(config, submission_id, output).await,
        Command::Status { submission_id } => app::status(config, submission_id, output).await,
    }
}
