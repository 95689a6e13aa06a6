//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use handoff_core::{AvailabilityPolicy, CheckOrder, EndpointStyle, Mode, SuspendStrategy};

/// Hand browser downloads to a local download manager.
///
/// Without a subcommand, runs as the browser's native-messaging host and
/// talks to the extension over stdin/stdout.
#[derive(Parser, Debug)]
#[command(name = "handoff")]
#[command(author, version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Arguments the browser passes when launching the host (caller origin, manifest path)
    #[arg(hide = true)]
    pub browser_args: Vec<String>,

    /// Window handle the browser passes on Windows
    #[arg(long, hide = true)]
    pub parent_window: Option<String>,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Base URL of the download manager's HTTP API
    #[arg(long, global = true, value_name = "URL")]
    pub agent_url: Option<String>,

    /// Settings database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Add endpoint family: link-collector or flash
    #[arg(long, global = true, value_name = "STYLE")]
    pub submit_endpoint: Option<EndpointStyle>,

    /// Availability policy: cooldown or probe
    #[arg(long, value_name = "POLICY")]
    pub availability_policy: Option<AvailabilityPolicy>,

    /// check-first or intercept-first
    #[arg(long, value_name = "ORDER")]
    pub check_order: Option<CheckOrder>,

    /// How native downloads are held: cancel or pause
    #[arg(long, value_name = "STRATEGY")]
    pub suspend_strategy: Option<SuspendStrategy>,

    /// Ignore the config file
    #[arg(long, global = true)]
    pub no_config: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Check that the download manager answers
    Ping,

    /// Send a link straight to the download manager
    Send {
        /// Link to hand over
        url: String,
    },

    /// Show or change the persisted mode
    Mode {
        #[command(subcommand)]
        action: Option<ModeAction>,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ModeAction {
    /// Print the current mode (default)
    Show,
    /// Advance Disabled -> Manual -> Auto -> Disabled
    Cycle,
    /// Set the mode explicitly
    Set {
        /// disabled, manual or auto
        mode: Mode,
    },
}
