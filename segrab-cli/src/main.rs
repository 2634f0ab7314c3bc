use clap::Parser;
use segrab_engine::{
    DownloadRequest, EngineConfig, ProgressEvent, StreamCoordinator, VariantSelectionPolicy,
};
use std::path::PathBuf;
use std::process;
use tracing::{Level, error, info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};
use url::Url;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The manifest URL of the stream to acquire
    url: String,

    /// Referring page the requests should appear to come from
    #[clap(long)]
    referer: Option<String>,

    /// Display name for the stream, also used to derive the output filename
    #[clap(long)]
    name: Option<String>,

    /// Output file path (defaults to <name>.ts, or stream.ts)
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Number of concurrent download partitions
    #[clap(long)]
    workers: Option<usize>,

    /// Quality label to select from a master playlist (e.g. "1920x1080")
    #[clap(short, long)]
    quality: Option<String>,

    /// List the qualities a master playlist offers and exit
    #[clap(long)]
    list_qualities: bool,

    /// Enable debug logging
    #[clap(short, long)]
    verbose: bool,

    /// Only log errors
    #[clap(long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    if let Err(e) = run(args).await {
        error!("{e}");
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let manifest_url = Url::parse(&args.url)?;

    let mut config = EngineConfig::default();
    if let Some(workers) = args.workers {
        config.scheduler.worker_count = workers;
    }
    if let Some(quality) = &args.quality {
        config.playlist.variant_selection_policy = VariantSelectionPolicy::Label(quality.clone());
    }

    let mut coordinator = StreamCoordinator::new(config);

    if args.list_qualities {
        let variants = coordinator
            .resolve_variants(&manifest_url, args.referer.as_deref())
            .await?;
        if variants.is_empty() {
            println!("media playlist, no qualities to choose from");
        } else {
            for variant in variants {
                println!("{}\t{} bps", variant.label, variant.bandwidth);
            }
        }
        return Ok(());
    }

    let logger = if let Some(events) = coordinator.events() {
        Some(tokio::spawn(log_events(events)))
    } else {
        None
    };

    let mut request = DownloadRequest::new(manifest_url);
    request.referer = args.referer;
    request.display_name = args.name.clone();

    let outcome = coordinator.run(request).await?;
    if let Some(logger) = logger {
        let _ = logger.await;
    }

    let output = args.output.unwrap_or_else(|| {
        PathBuf::from(format!("{}.ts", args.name.as_deref().unwrap_or("stream")))
    });
    tokio::fs::write(&output, &outcome.artifact).await?;
    info!(
        path = %output.display(),
        size = outcome.size,
        completed = outcome.completed,
        failed = outcome.failed,
        "artifact written"
    );

    if outcome.failed > 0 {
        warn!(
            failed = outcome.failed,
            "some segments failed permanently, the artifact has gaps"
        );
    }
    Ok(())
}

async fn log_events(mut events: tokio::sync::mpsc::Receiver<ProgressEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            ProgressEvent::SegmentCompleted {
                completed,
                total_segments,
                cumulative_bytes,
                eta_seconds,
                ..
            } => {
                info!(
                    completed,
                    total = total_segments,
                    bytes = cumulative_bytes,
                    eta_secs = eta_seconds.map(|e| e.round()),
                    "segment completed"
                );
            }
            ProgressEvent::StallRevived { revive_count } => {
                warn!(revive_count, "stall detected, in-flight fetches revived");
            }
            ProgressEvent::Finished { .. } | ProgressEvent::Failed { .. } => break,
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}
