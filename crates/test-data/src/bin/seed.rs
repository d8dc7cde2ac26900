//! Fills a run history database with generated runs.
//!
//! Run with:
//! ```
//! cargo run -p test-data --bin seed -- [run_count] [gpx_dir]
//! ```

use std::{env, path::PathBuf};

use rand::{Rng, SeedableRng, rngs::StdRng};
use runs::{RunStore, SqliteRunStore, config::DEFAULT_DATABASE_URL, init_logging};
use test_data::{
    config::SeedConfig,
    gpx::write_run_file,
    profiles::RunnerProfile,
    sources::ProceduralTrace,
};

const DAY_MS: i64 = 86_400_000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let mut config = SeedConfig::default();
    let mut args = env::args().skip(1);
    if let Some(count) = args.next() {
        config.run_count = count.parse()?;
    }
    let gpx_dir = args.next().map(PathBuf::from);

    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
    let store = SqliteRunStore::connect(&database_url).await?;
    tracing::info!("Connected to {}", database_url);

    if let Some(dir) = &gpx_dir {
        std::fs::create_dir_all(dir)?;
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let profiles = [
        RunnerProfile::recreational(),
        RunnerProfile::default(),
        RunnerProfile::elite(),
    ];
    let first_start_ms = 1_735_725_600_000 - config.run_count as i64 * config.days_between_runs * DAY_MS;

    for i in 0..config.run_count {
        let profile = &profiles[rng.gen_range(0..profiles.len())];
        let distance_km = rng.gen_range(config.distance_km.0..config.distance_km.1);
        let start_ms = first_start_ms + i as i64 * config.days_between_runs * DAY_MS;
        let mut trace = ProceduralTrace::new()
            .with_distance(distance_km)
            .with_start_time(start_ms);
        if rng.gen_bool(0.2) {
            trace = trace.without_heart_rate();
        }
        let (lat, lon) = config.region.random_point(&mut rng);
        let generated = trace.with_start(lat, lon).generate(profile, &mut rng);

        let run = store.save(generated.to_run_insert()).await?;
        tracing::info!(
            id = run.id,
            distance_km = run.distance_km,
            points = run.path.len(),
            "Seeded run"
        );

        if let Some(dir) = &gpx_dir {
            write_run_file(&run, &format!("Run {}", run.id), dir.join(format!("run-{}.gpx", run.id)))?;
        }
    }

    tracing::info!("Seed completed: {} runs", config.run_count);
    Ok(())
}
