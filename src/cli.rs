use clap::{Parser, Subcommand};
use harvest_core::TimeWindow;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(author, version, about = "Export Reddit threads with every comment as CSV")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// CSV file to write; defaults to a timestamped file in the output dir
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Threads processed at once (1-8), overrides the configuration
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Also write the per-thread failure report as JSON
    #[arg(long, global = true)]
    pub report: Option<PathBuf>,

    /// No per-thread progress lines
    #[arg(short, long, global = true, default_value_t = false)]
    pub quiet: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Export the given threads, by ID or URL
    Threads {
        #[arg(required = true)]
        threads: Vec<String>,
    },
    /// Export the top threads of a subreddit
    Top {
        community: String,
        #[arg(long, default_value = "day")]
        window: TimeWindow,
        #[arg(long, default_value_t = 100)]
        limit: u32,
    },
}
