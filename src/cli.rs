use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "anirename")]
#[command(author, version, about, long_about = None)]
#[command(about = "Rename anime episode files to season/episode names using AniList metadata")]
pub struct Args {
    /// Directory containing anime episode files
    #[arg(required_unless_present = "reset_scan_log")]
    pub target_dir: Option<PathBuf>,

    /// Simulate changes without modifying the filesystem
    #[arg(short, long)]
    pub dry: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Process subdirectories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Ignore cached lookups and the scan log for this run
    #[arg(short, long)]
    pub force_refresh: bool,

    /// Always ask which series is meant when a title is ambiguous
    #[arg(short, long, conflicts_with = "batch")]
    pub interactive: bool,

    /// Never prompt; files with ambiguous titles are skipped
    #[arg(short, long)]
    pub batch: bool,

    /// Put OVAs and other specials in season 0
    #[arg(long)]
    pub bundle_ova: bool,

    /// Skip directories already fully renamed by an earlier run
    #[arg(long)]
    pub incremental: bool,

    /// Forget which directories were already processed
    #[arg(long)]
    pub reset_scan_log: bool,

    /// Configuration file (default: <config dir>/anirename/config.toml)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}
