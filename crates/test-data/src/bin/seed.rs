//! Writes a synthetic athlete history into the planner's data directory.
//!
//! Run with:
//! ```
//! PLANNER_DATA_DIR=/tmp/planner cargo run -p test-data --bin seed
//! ```

use planner::PlannerConfig;
use test_data::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let planner = PlannerConfig::from_env();
    let config = SeedConfig {
        athlete: planner.athlete.clone(),
        seed: std::env::var("SEED")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(12345),
        ..SeedConfig::default()
    };

    tracing::info!(
        "Seeding {} block(s) for {} into {}",
        config.blocks,
        config.athlete,
        planner.activities_dir().display()
    );

    let summary = HistoryGenerator::new(config).write(&planner.activities_dir())?;

    tracing::info!("Seed completed!");
    tracing::info!("  Runs: {}", summary.runs);
    tracing::info!("  Rides: {}", summary.rides);
    if let (Some(first), Some(last)) = (summary.first_day, summary.last_day) {
        tracing::info!("  Days: {first} - {last}");
    }

    Ok(())
}
