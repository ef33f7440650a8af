use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use t20_sim::config::Config;
use t20_sim::sim::{ModelParams, TeamProbabilities};
use t20_sim::{MatchModel, MonteCarlo, ProbabilityTable, RunOptions, TeamRegistry};

/// Title chances in this band are reported as dark horses.
const DARK_HORSE_BAND: std::ops::Range<f64> = 0.01..0.05;

/// JSON document written by `--output`.
#[derive(Serialize)]
struct Report<'a> {
    generated_at: DateTime<Utc>,
    model: &'a ModelParams,
    table: &'a ProbabilityTable,
}

fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let registry = match &config.roster {
        Some(path) => TeamRegistry::load(path)?,
        None => TeamRegistry::builtin()?,
    };
    let model = MatchModel::new(config.model_params())?;

    let seed = config.seed.unwrap_or_else(rand::random);
    if config.seed.is_none() {
        info!("No seed given, using {} (pass --seed {} to replay)", seed, seed);
    }

    let mut options = RunOptions::new(config.iterations, seed).with_threads(config.threads);
    if let Some(secs) = config.time_budget_secs {
        let stop = Arc::new(AtomicBool::new(false));
        let trigger = Arc::clone(&stop);
        // Detached; the process exits before it matters if the run ends first.
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_secs(secs));
            trigger.store(true, Ordering::Relaxed);
        });
        options = options.with_stop(stop);
    }

    let table = MonteCarlo::new(&registry, &model).run(&options)?;

    print_summary(&table, &registry, config.top);

    if let Some(path) = &config.output {
        let report = Report {
            generated_at: Utc::now(),
            model: model.params(),
            table: &table,
        };
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("Results saved to {}", path.display());
    }

    Ok(())
}

fn pct(p: f64) -> f64 {
    p * 100.0
}

fn print_summary(table: &ProbabilityTable, registry: &TeamRegistry, top: usize) {
    let ranked = table.ranked();

    println!("{}", "=".repeat(80));
    println!(
        "CHAMPIONSHIP PROBABILITIES ({} simulations{})",
        table.completed,
        if table.cancelled { ", stopped early" } else { "" }
    );
    println!("{}", "=".repeat(80));
    println!(
        "{:<6} {:<25} {:>10} {:>10} {:>10} {:>10}",
        "Rank", "Team", "Win %", "Final %", "Semi %", "Super 8 %"
    );
    println!("{}", "-".repeat(80));
    for (rank, row) in ranked.iter().take(top).enumerate() {
        let p = &row.probabilities;
        println!(
            "{:<6} {:<25} {:>9.2}% {:>9.2}% {:>9.2}% {:>9.2}%",
            rank + 1,
            row.team,
            pct(p.champion),
            pct(p.finalist),
            pct(p.semi_finalist),
            pct(p.group_qualified)
        );
    }

    for group in registry.groups() {
        println!();
        println!("Group {} ({})", group.name, group.venue.name);
        println!(
            "{:<25} {:>12} {:>14} {:>14}",
            "Team", "Qualify %", "Top Group %", "Runner-up %"
        );
        let mut rows: Vec<&TeamProbabilities> =
            table.teams.iter().filter(|t| t.group == group.name).collect();
        rows.sort_by(|a, b| {
            b.counts
                .group_qualified
                .cmp(&a.counts.group_qualified)
                .then(a.team.cmp(&b.team))
        });
        for row in rows {
            println!(
                "{:<25} {:>11.1}% {:>13.1}% {:>13.1}%",
                row.team,
                pct(row.probabilities.group_qualified),
                pct(row.probabilities.group_winner),
                pct(row.probabilities.group_runner_up)
            );
        }
    }

    println!();
    if let Some(favourite) = ranked.first() {
        println!(
            "Most likely champion: {} ({:.1}%)",
            favourite.team,
            pct(favourite.probabilities.champion)
        );
    }
    let dark_horses: Vec<&&TeamProbabilities> = ranked
        .iter()
        .filter(|r| DARK_HORSE_BAND.contains(&r.probabilities.champion))
        .collect();
    if !dark_horses.is_empty() {
        println!("Dark horses (1-5% title chance):");
        for row in dark_horses {
            println!("  {}: {:.2}%", row.team, pct(row.probabilities.champion));
        }
    }
}
