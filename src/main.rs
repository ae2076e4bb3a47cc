use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod api;
mod cli;
mod config;
mod ingest;

use api::ApiClient;
use cli::{Cli, Command};
use config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let directive = match cli.verbose {
        0 => "camrec=info",
        1 => "camrec=debug",
        _ => "camrec=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(cli.config.as_deref())?;

    // Graceful shutdown is requested exactly once; a second signal while it
    // is already pending aborts the process on the spot.
    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        if handler_flag.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
    })?;

    match cli.command {
        Command::Record(args) => record(args, &config, cli.verbose, shutdown).await,
        Command::Devices(args) => devices(args, &config).await,
        Command::Monitor(args) => monitor(args, &config, shutdown).await,
        Command::Mediafile(args) => mediafile(args, &config, shutdown).await,
    }
}

async fn record(
    args: cli::RecordArgs,
    config: &Config,
    verbosity: u8,
    shutdown: Arc<AtomicBool>,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = ApiClient::new(&config.api.base_url, &args.api.apikey);
    let options = ingest::RecordOptions {
        url: client.live_playlist_url(&args.device_id),
        auth_header: client.stream_auth_header(),
        output_dir: args.output_dir,
        split_duration: args.split_duration,
        max_overrun_secs: config.segment.max_overrun_secs,
        transport: config.transport.clone(),
        verbosity,
    };

    tracing::info!(device = %args.device_id, "recording live stream, press Ctrl+C to stop");

    // The pump is a blocking single-threaded loop; keep it off the runtime.
    let segments = tokio::task::spawn_blocking(move || {
        let recorder = ingest::Recorder::open(options, shutdown)?;
        recorder.run()
    })
    .await??;

    tracing::info!(segments, "recording finished");
    Ok(())
}

async fn devices(args: cli::DevicesArgs, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let client = ApiClient::new(&config.api.base_url, &args.api.apikey);
    let query = api::devices::DeviceQuery {
        offset: args.offset,
        limit: args.limit,
        item_id: args.item_id,
    };

    let devices = api::devices::list(&client, &query).await?;
    println!("{}", serde_json::to_string_pretty(&devices)?);
    Ok(())
}

async fn monitor(
    args: cli::MonitorArgs,
    config: &Config,
    shutdown: Arc<AtomicBool>,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = ApiClient::new(&config.api.base_url, &args.api.apikey);

    tracing::info!(
        device = %args.device_id,
        interval = args.interval,
        "watching device image, press Ctrl+C to stop"
    );
    api::monitor::run(
        &client,
        &args.device_id,
        &args.definition_id,
        Duration::from_secs(args.interval),
        &shutdown,
    )
    .await?;
    Ok(())
}

async fn mediafile(
    args: cli::MediafileArgs,
    config: &Config,
    shutdown: Arc<AtomicBool>,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = ApiClient::new(&config.api.base_url, &args.api.apikey);

    let path = api::mediafile::download(
        &client,
        &args.device_id,
        args.start,
        args.end,
        &args.output_dir,
        &shutdown,
    )
    .await?;
    tracing::info!(path = %path.display(), "media file downloaded");
    Ok(())
}
