use std::path::PathBuf;

use chrono::NaiveDateTime;
use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "camrec", version)]
#[command(about = "Record and export camera footage through the Safie open API")]
pub struct Cli {
    /// Optional TOML config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Record the live stream into keyframe-aligned MP4 segments
    Record(RecordArgs),
    /// List devices visible to the API key
    Devices(DevicesArgs),
    /// Watch the latest device image and post an event when analysis fires
    Monitor(MonitorArgs),
    /// Request a recorded media file export and download it
    Mediafile(MediafileArgs),
}

#[derive(Debug, Args)]
pub struct ApiOpts {
    /// API key, falls back to the SAFIE_API_KEY environment variable
    #[arg(
        short = 'k',
        long = "apikey",
        env = "SAFIE_API_KEY",
        hide_env_values = true,
        value_name = "APIKEY"
    )]
    pub apikey: String,
}

#[derive(Debug, Args)]
pub struct RecordArgs {
    #[command(flatten)]
    pub api: ApiOpts,

    /// Camera device ID to record from
    #[arg(short, long, value_name = "DEVICEID")]
    pub device_id: String,

    /// Directory segment files are written into
    #[arg(short, long, default_value = ".", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Split duration of output MP4 files, in seconds
    #[arg(
        short,
        long,
        default_value_t = 60.0,
        value_parser = parse_split_duration,
        value_name = "SECS"
    )]
    pub split_duration: f64,
}

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(flatten)]
    pub api: ApiOpts,

    /// Item offset into the device list
    #[arg(short, long, default_value_t = 0)]
    pub offset: u32,

    /// Maximum number of devices to return
    #[arg(
        short,
        long,
        default_value_t = 20,
        value_parser = clap::value_parser!(u32).range(0..=100)
    )]
    pub limit: u32,

    /// Only list devices attached to this option plan item
    #[arg(short, long)]
    pub item_id: Option<u32>,
}

#[derive(Debug, Args)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub api: ApiOpts,

    /// Camera device ID to watch
    #[arg(short, long, value_name = "DEVICEID")]
    pub device_id: String,

    /// Event definition ID registered when analysis fires
    #[arg(short = 'e', long, value_name = "ID")]
    pub definition_id: String,

    /// Seconds between image fetches
    #[arg(
        long,
        default_value_t = 5,
        value_parser = clap::value_parser!(u64).range(1..),
        value_name = "SECS"
    )]
    pub interval: u64,
}

#[derive(Debug, Args)]
pub struct MediafileArgs {
    #[command(flatten)]
    pub api: ApiOpts,

    /// Camera device ID the recording belongs to
    #[arg(short, long, value_name = "DEVICEID")]
    pub device_id: String,

    /// Start of the recorded range, local time, yyyy-mm-ddTHH:MM:SS
    #[arg(short, long, value_parser = parse_datetime, value_name = "DATETIME")]
    pub start: NaiveDateTime,

    /// End of the recorded range, local time, yyyy-mm-ddTHH:MM:SS
    #[arg(short, long, value_parser = parse_datetime, value_name = "DATETIME")]
    pub end: NaiveDateTime,

    /// Directory the downloaded file is written into
    #[arg(short, long, default_value = ".", value_name = "DIR")]
    pub output_dir: PathBuf,
}

fn parse_split_duration(value: &str) -> Result<f64, String> {
    let secs: f64 = value
        .parse()
        .map_err(|_| "expected a number of seconds".to_string())?;
    if secs > 0.0 {
        Ok(secs)
    } else {
        Err("split duration must be positive".to_string())
    }
}

fn parse_datetime(value: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .map_err(|_| "expected yyyy-mm-ddTHH:MM:SS".to_string())
}
