//! Mood: queue-to-dashboard emotion bridge
//!
//! Main binary with subcommands:
//! - `serve`: HTTP bridge that dequeues one emotion sample per request
//! - `watch`: Poll a running bridge and print the display state
//! - `publish`: Push a sample onto the queue (what the scorer does)

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod publish;
mod serve;
mod watch;

const DEFAULT_LOG_FILTER: &str = "mood=info,mood_web=info,mood_queue=info,mood_poller=info";

#[derive(Parser)]
#[command(name = "mood")]
#[command(about = "Queue-to-dashboard emotion bridge", long_about = None)]
struct Cli {
    /// Durable queue holding emotion samples
    #[arg(long, env = "MOOD_QUEUE", default_value = mood_queue::DEFAULT_QUEUE, global = true)]
    queue: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP bridge
    Serve {
        /// AMQP broker URL
        #[arg(long, env = "RABBIT_URL")]
        rabbit_url: String,

        /// Address to listen on
        #[arg(long, env = "MOOD_LISTEN", default_value = "0.0.0.0:3000")]
        listen: String,

        /// Dashboard origin allowed to call the bridge cross-origin
        #[arg(long, env = "MOOD_ALLOW_ORIGIN")]
        allow_origin: Option<String>,
    },

    /// Poll a bridge and print each new sample
    Watch {
        /// Full URL of the bridge endpoint
        #[arg(
            long,
            env = "MOOD_BRIDGE_URL",
            default_value = "http://127.0.0.1:3000/api/emotion"
        )]
        url: String,

        /// Polling period in milliseconds
        #[arg(long, default_value = "3000")]
        interval_ms: u64,
    },

    /// Publish one emotion sample to the queue
    Publish {
        /// AMQP broker URL
        #[arg(long, env = "RABBIT_URL")]
        rabbit_url: String,

        /// A scored emotion as `label=score` (repeatable)
        #[arg(
            long = "emotion",
            value_name = "LABEL=SCORE",
            value_parser = publish::parse_emotion_arg,
            required_unless_present = "result_file",
            conflicts_with = "result_file"
        )]
        emotions: Vec<(String, f64)>,

        /// Scorer result document with an `emotion` map
        #[arg(long)]
        result_file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            rabbit_url,
            listen,
            allow_origin,
        } => serve::run(&rabbit_url, &cli.queue, &listen, allow_origin.as_deref()).await,

        Commands::Watch { url, interval_ms } => watch::run(&url, interval_ms).await,

        Commands::Publish {
            rabbit_url,
            emotions,
            result_file,
        } => {
            let sample = match result_file {
                Some(path) => publish::load_result_file(&path)?,
                None => publish::sample_from_args(emotions),
            };
            publish::run(&rabbit_url, &cli.queue, sample).await
        }
    }
}
