use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "klaxon",
    version,
    about = "Sound the alarm for every feed notification until someone acknowledges it",
    long_about = None
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file (defaults to <config dir>/klaxon/config.toml)
    #[arg(short, long, global = true, env = "KLAXON_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Also write a daily rotated log file into this directory
    #[arg(long, global = true, env = "KLAXON_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,
}

/// Settings given on the command line or through the environment. Anything
/// left unset falls back to the configuration file.
#[derive(ClapArgs, Debug, Default, Clone)]
pub struct Overrides {
    /// Newline-delimited JSON feed to subscribe to
    #[arg(long, global = true, env = "KLAXON_FEED_URL")]
    pub feed_url: Option<String>,

    /// Sound file played on every alarm pulse
    #[arg(long, global = true, env = "KLAXON_ALARM_FILE")]
    pub alarm_file: Option<PathBuf>,

    /// Seconds to wait for an acknowledgment before the next pulse
    #[arg(long, global = true, env = "KLAXON_ACK_TIMEOUT", value_name = "SECS")]
    pub ack_timeout: Option<u64>,

    /// Seconds to sleep after a feed failure before reconnecting
    #[arg(long, global = true, env = "KLAXON_RECOVERY_SLEEP", value_name = "SECS")]
    pub recovery_sleep: Option<u64>,

    /// Vibration length of each pulse
    #[arg(long, global = true, env = "KLAXON_VIBRATION_MS", value_name = "MS")]
    pub vibration_ms: Option<u64>,

    /// Seconds allowed for establishing the feed connection
    #[arg(long, global = true, env = "KLAXON_CONNECT_TIMEOUT", value_name = "SECS")]
    pub connect_timeout: Option<u64>,

    /// Ctrl-C during the acknowledgment wait dismisses the alarm instead of
    /// sounding the next pulse
    #[arg(
        long,
        global = true,
        env = "KLAXON_INTERRUPT_ENDS_EPISODE",
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub interrupt_ends_episode: Option<bool>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Subscribe to the feed and alarm on every message (default)
    Run,

    /// Configuration management
    Config {
        /// Print the effective configuration as TOML
        #[arg(long)]
        show: bool,
    },

    /// Query the device volume once and print it
    Check,
}
