//! Run command - Drive mock generations through a feature queue
//!
//! Usage:
//! ```bash
//! studio run --feature image --jobs 4
//! studio run --feature video --jobs 6 --fail-every 3 --delay-ms 1500
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use studio_gen::{Feature, GenerationRequest, Generator, MockGenerator, StudioConfig, StudioQueues};
use studio_queue::{JobId, JobStatus, QueueConfig, QueueSnapshot};
use tracing::info;

use crate::{print_error, print_success};

/// Arguments for the run command
#[derive(Args)]
pub struct RunArgs {
    /// Feature queue to use (image, video, storybook)
    #[arg(short, long, default_value = "image")]
    pub feature: Feature,

    /// Number of generations to submit
    #[arg(short, long, default_value_t = 3)]
    pub jobs: usize,

    /// Simulated latency of each generation in milliseconds
    #[arg(long, default_value_t = 800)]
    pub latency_ms: u64,

    /// Make every n-th generation fail (0 = never)
    #[arg(long, default_value_t = 0)]
    pub fail_every: u32,

    /// Override the feature's cool-down in milliseconds
    #[arg(long, allow_negative_numbers = true)]
    pub delay_ms: Option<i64>,

    /// Countdown refresh interval in milliseconds
    #[arg(long)]
    pub tick_ms: Option<u64>,
}

/// Run the batch
pub async fn run(args: RunArgs) -> Result<()> {
    if args.jobs == 0 {
        bail!("--jobs must be at least 1");
    }

    let feature = args.feature;
    let mut config = StudioConfig::from_env();
    {
        let queue = config.get_mut(feature);
        if let Some(ms) = args.delay_ms {
            *queue = QueueConfig::from_millis(feature.as_str(), ms);
        }
        if let Some(ms) = args.tick_ms {
            *queue = queue.clone().with_tick_interval(Duration::from_millis(ms));
        }
    }

    let queues = StudioQueues::new(&config);
    let queue = queues.queue(feature);
    let generator: Arc<dyn Generator> = Arc::new(
        MockGenerator::new(Duration::from_millis(args.latency_ms)).failing_every(args.fail_every),
    );

    println!(
        "{} {} generations, cool-down {}ms",
        "Submitting".bold(),
        args.jobs,
        queue.config().cooldown_ms()
    );

    let handles: Vec<_> = (1..=args.jobs)
        .map(|n| {
            let request = GenerationRequest::new(feature, format!("{feature} request #{n}"));
            queues.generate(generator.clone(), request)
        })
        .collect();

    let labels: Vec<(JobId, String)> = handles
        .iter()
        .enumerate()
        .map(|(i, handle)| (handle.id(), format!("#{}", i + 1)))
        .collect();

    let board = StatusBoard::new(labels);
    let subscription = queue.subscribe(move |snapshot| board.render(snapshot));

    let (mut succeeded, mut failed) = (0usize, 0usize);
    for (i, handle) in handles.into_iter().enumerate() {
        match handle.await {
            Ok(artifact) => {
                succeeded += 1;
                print_success(&format!(
                    "#{} {} ({}ms)",
                    i + 1,
                    artifact.uri,
                    artifact.latency_ms
                ));
            }
            Err(e) => {
                failed += 1;
                print_error(&format!("#{} {}", i + 1, e));
            }
        }
    }

    subscription.unsubscribe();
    info!(%feature, succeeded, failed, "Batch finished");
    println!(
        "{} {} succeeded, {} failed",
        "Done:".bold(),
        succeeded.to_string().green(),
        failed.to_string().red()
    );

    Ok(())
}

/// Prints a job's status line whenever it changes
struct StatusBoard {
    labels: Vec<(JobId, String)>,
    last: Mutex<HashMap<JobId, JobStatus>>,
}

impl StatusBoard {
    fn new(labels: Vec<(JobId, String)>) -> Self {
        Self {
            labels,
            last: Mutex::new(HashMap::new()),
        }
    }

    fn render(&self, snapshot: &QueueSnapshot) {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        for (id, label) in &self.labels {
            let status = snapshot.status_of(*id);
            if status == JobStatus::Untracked || last.get(id) == Some(&status) {
                continue;
            }
            last.insert(*id, status);
            println!("  {} {}", label.dimmed(), status);
        }
    }
}
