//! Info command - Show resolved queue configuration
//!
//! Usage:
//! ```bash
//! studio info
//! studio info --json
//! ```

use std::env;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde_json::json;
use studio_gen::{Feature, StudioConfig};

/// Arguments for the info command
#[derive(Args)]
pub struct InfoArgs {
    /// Print machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

/// Run the info command
pub fn run(args: InfoArgs) -> Result<()> {
    let config = StudioConfig::from_env();

    if args.json {
        let queues: Vec<_> = Feature::ALL
            .iter()
            .map(|feature| {
                let queue = config.get(*feature);
                json!({
                    "feature": feature,
                    "envVar": feature.delay_env_var(),
                    "cooldownMs": queue.cooldown_ms(),
                    "tickMs": queue.tick_interval.as_millis() as u64,
                    "fromEnv": is_set(feature.delay_env_var()),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&json!({ "queues": queues }))?);
        return Ok(());
    }

    let version = env!("CARGO_PKG_VERSION");
    println!("{}", "Generation Studio".bold().cyan());
    println!("{}", "═".repeat(50).cyan());
    println!();

    println!("{}", "Version Information:".bold());
    println!("  {} {}", "CLI Version:".dimmed(), version.green());
    println!();

    println!("{}", "Feature Queues:".bold());
    for feature in Feature::ALL {
        let queue = config.get(feature);
        let source = if is_set(feature.delay_env_var()) {
            feature.delay_env_var().to_string()
        } else {
            format!("default, set {} to override", feature.delay_env_var())
        };
        println!(
            "  {} {} cool-down {} ({})",
            "•".cyan(),
            format!("{:<10}", feature.as_str()).green(),
            format!("{}ms", queue.cooldown_ms()).bold(),
            source.dimmed()
        );
    }
    println!();

    Ok(())
}

fn is_set(var: &str) -> bool {
    env::var_os(var).is_some()
}
