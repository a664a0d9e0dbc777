use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "dubfeed",
    version,
    about = "Sync the dubbed anime schedule and episode feed from animeschedule.net"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Bearer token for the animeschedule.net API.
    #[arg(long, env = "ANIMESCHEDULE_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    #[arg(
        long,
        env = "DUBFEED_BASE_URL",
        default_value = "https://animeschedule.net/api/v3",
        global = true
    )]
    pub base_url: String,

    /// Directory holding raw/, custom/ and changes.txt.
    #[arg(long, env = "DUBFEED_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Delay between successive API calls, in milliseconds.
    #[arg(long, default_value_t = 500, global = true)]
    pub throttle_ms: u64,

    #[arg(long, default_value_t = 1, global = true)]
    pub lookback_weeks: u32,

    #[arg(long, default_value_t = 1, global = true)]
    pub lookahead_weeks: u32,

    /// Minimum title similarity (0.0-1.0) for matching an entry whose route changed.
    #[arg(long, default_value_t = 0.9, global = true)]
    pub alias_confidence: f64,

    /// Upper bound (days) on how old a vanished episode may be and still be retracted from the feed.
    #[arg(long, default_value_t = 14, global = true)]
    pub feed_window_days: i64,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch the timetables, reconcile the schedule and update the episode feed.
    UpdateDubs,
    /// Rebuild the episode feed from the stored schedule only.
    UpdateFeed,
    /// Print last week's dub timetable.
    PreviousWeek,
}
