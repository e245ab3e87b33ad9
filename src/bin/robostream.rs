// SPDX-FileCopyrightText: 2026 Strata Contributors
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # robostream CLI
//!
//! Developer inspection tool for ROS1 bag and MCAP files, not the playback
//! UI the engine is built for — no subscriptions, no rendering.
//!
//! ```sh
//! robostream inspect drive.mcap
//! robostream dump drive.bag --topic /imu --limit 50
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use robostream::core::model::TopicSelectionEntry;
use robostream::core::time::Time;
use robostream::factory::{DataSourceInput, RemoteDataSourceFactory};
use robostream::source::MessageIteratorArgs;

type Result<T = ()> = anyhow::Result<T>;

#[derive(Parser)]
#[command(name = "robostream")]
#[command(about = "Inspect ROS1 bag and MCAP robotics log files", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a file or URL and print its time range, topics, and per-topic
    /// message counts.
    Inspect {
        #[arg(value_name = "PATH_OR_URL")]
        input: String,
    },
    /// Decode messages and print them as JSON lines.
    Dump {
        #[arg(value_name = "PATH_OR_URL")]
        input: String,
        /// Restrict to these topics (default: every topic in the file).
        #[arg(long = "topic")]
        topics: Vec<String>,
        /// Stop after this many messages.
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn input_descriptor(raw: &str) -> DataSourceInput {
    if raw.starts_with("http://") || raw.starts_with("https://") {
        DataSourceInput::Url(raw.to_string())
    } else {
        DataSourceInput::File(PathBuf::from(raw))
    }
}

fn format_timestamp(time: Time) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp(time.secs, time.nanos)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| format!("{}.{:09}", time.secs, time.nanos))
}

async fn run_inspect(input: String) -> Result {
    let factory = RemoteDataSourceFactory::new();
    let worker = factory.initialize(input_descriptor(&input), None);
    let init = worker.initialize().await?;

    println!("time range: {} .. {}", format_timestamp(init.start), format_timestamp(init.end));
    if let Some(profile) = &init.profile {
        println!("profile: {profile}");
    }
    println!("topics:");
    for topic in &init.topics {
        let stats = init.topic_stats.get(&topic.name);
        let count = stats.map(|s| s.num_messages).unwrap_or(0);
        let schema = topic.schema_name.as_deref().unwrap_or("<unknown>");
        println!("  {:<32} {:>10} msgs   {}", topic.name, count, schema);
    }
    worker.terminate();
    Ok(())
}

async fn run_dump(input: String, topics: Vec<String>, limit: Option<usize>) -> Result {
    let factory = RemoteDataSourceFactory::new();
    let worker = factory.initialize(input_descriptor(&input), None);
    let init = worker.initialize().await?;

    let selected: Vec<String> = if topics.is_empty() { init.topics.iter().map(|t| t.name.clone()).collect() } else { topics };
    let topic_selection = selected
        .into_iter()
        .map(|name| (name.clone(), TopicSelectionEntry { topic: name, preload: None }))
        .collect::<HashMap<_, _>>();

    let mut cursor = worker.get_message_cursor(MessageIteratorArgs { topics: topic_selection, start: None, end: None, reverse: false }, None).await?;

    let mut printed = 0usize;
    loop {
        if limit.is_some_and(|n| printed >= n) {
            break;
        }
        let Some(item) = cursor.next().await else { break };
        if let robostream::core::model::IteratorResult::MessageEvent(event) = item {
            println!("{}", serde_json::to_string(&event)?);
            printed += 1;
        }
    }
    cursor.end();
    worker.terminate();
    Ok(())
}

async fn run() -> Result {
    let cli = Cli::parse();
    match cli.command {
        Commands::Inspect { input } => run_inspect(input).await,
        Commands::Dump { input, topics, limit } => run_dump(input, topics, limit).await,
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
