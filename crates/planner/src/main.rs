use planner::{PlannerConfig, run_pass, today};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().pretty())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let config = PlannerConfig::from_env();

    tracing::info!(
        "Loading athlete {} from {}",
        config.athlete,
        config.data_dir.display()
    );

    // Loading and evaluation are blocking; keep them off the runtime threads.
    let pass = tokio::task::spawn_blocking(move || run_pass(&config, today())).await??;

    for (start, end) in &pass.seasons {
        tracing::info!("Season {start} - {end}");
    }
    if let Some(latest) = pass.pmc.last() {
        tracing::info!(
            "{}: long term stress {:.1}, short term stress {:.1}, balance {:.1}",
            latest.date,
            latest.chronic,
            latest.acute,
            latest.balance
        );
    }
    tracing::info!(
        "Processed {} activities and {} workouts",
        pass.activities,
        pass.workouts
    );
    Ok(())
}
