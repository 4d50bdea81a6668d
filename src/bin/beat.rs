use std::time::Duration;

use clap::Parser;

use roomcast::beat::{BeatClient, BeatSchedule};

/// Periodically publish a status update to a roomcast room.
#[derive(Debug, Parser)]
#[command(name = "roomcast-beat", version)]
struct Args {
    /// Base URL of the roomcast server.
    #[arg(long, default_value = "http://127.0.0.1:39100")]
    url: String,

    #[arg(long, default_value = "status")]
    room: String,

    #[arg(long, default_value = "RUNNING")]
    status: String,

    #[arg(long, default_value_t = 10)]
    interval_secs: u64,

    /// Publish key; falls back to ROOMCAST_PUBLISH_KEY.
    #[arg(long, env = "ROOMCAST_PUBLISH_KEY")]
    key: String,

    /// Stop after this many posts.
    #[arg(long)]
    count: Option<u64>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roomcast=info,roomcast_beat=info".into()),
        )
        .init();

    let args = Args::parse();
    let client = BeatClient::new(&args.url, &args.key);
    let schedule = BeatSchedule {
        room: args.room,
        status: args.status,
        interval: Duration::from_secs(args.interval_secs.max(1)),
        count: args.count,
    };

    tracing::info!(
        url = %args.url,
        room = %schedule.room,
        "publishing {:?} every {:?}",
        schedule.status,
        schedule.interval
    );

    let sent = tokio::select! {
        sent = roomcast::beat::run(&client, &schedule) => sent,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted");
            return;
        }
    };

    tracing::info!("published {sent} status update(s)");
}
