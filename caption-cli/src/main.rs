mod cli;
mod error;
mod output;
mod producers;

use std::process;

use arib_caption::CaptionEncoder;
use clap::Parser;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::{cli::Args, error::Result, output::open_output};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let code = match run(args).await {
        Ok(()) => 0,
        Err(e) => {
            error!("Application error: {}", e);
            eprintln!("Error: {}", e);
            1
        }
    };
    // stdin may still be parked in a blocking read after Ctrl+C
    process::exit(code);
}

async fn run(args: Args) -> Result<()> {
    let config = args.encoder_config();
    let sink = open_output(&args.output).await?;
    info!(
        segment_mode = %config.segment_mode,
        output = %args.output,
        heartbeat_secs = args.heartbeat,
        "Starting caption encoder"
    );

    let (handle, encoder) = CaptionEncoder::new(config, sink).spawn();
    let token = CancellationToken::new();

    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing pending captions");
            ctrl_c_token.cancel();
        }
    });

    if !args.no_new_management {
        handle.new_management().await?;
    }

    let heartbeat = tokio::spawn(producers::heartbeat(
        handle.clone(),
        args.heartbeat_period(),
        token.clone(),
    ));

    let stdin = BufReader::new(tokio::io::stdin());
    let lines = producers::forward_lines(stdin, &handle, &token).await;

    token.cancel();
    let beats = heartbeat.await?;
    drop(handle);

    let stats = encoder.await??;
    let lines = lines?;

    info!(
        lines,
        heartbeats = beats,
        packets = stats.packets,
        bytes = stats.bytes,
        rejected = stats.rejected,
        "Caption stream finished"
    );
    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    // stdout may carry the caption stream
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr),
        )
        .init();
}
