use std::env;

use anyhow::Context;
use runs::{
    RunStore, SqliteRunStore,
    config::DEFAULT_DATABASE_URL,
    detail::RunDetail,
    format::{format_duration, format_pace},
    init_logging,
    models::Run,
};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

fn started_at(run: &Run) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(run.start_time_ms) * 1_000_000)
        .ok()
        .and_then(|t| t.format(&Rfc3339).ok())
        .unwrap_or_else(|| run.start_time_ms.to_string())
}

fn bpm(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |b| format!("{b:.0}"))
}

fn print_history(runs: &[Run]) {
    if runs.is_empty() {
        println!("No runs recorded yet.");
        return;
    }
    println!("{:>5}  {:<25} {:>8} {:>9} {:>7} {:>5}", "id", "started", "km", "time", "pace", "bpm");
    for run in runs {
        println!(
            "{:>5}  {:<25} {:>8.2} {:>9} {:>7} {:>5}",
            run.id,
            started_at(run),
            run.distance_km,
            format_duration(run.duration_seconds),
            format_pace(run.pace_min_per_km),
            bpm(run.avg_heart_rate),
        );
    }
}

fn print_detail(run: &Run) {
    let detail = RunDetail::from_run(run);
    println!("Run {} started {}", detail.id, started_at(run));
    println!(
        "{:.2} km in {} ({} /km), avg bpm {}",
        detail.distance_km,
        format_duration(detail.duration_seconds),
        format_pace(detail.avg_pace_min_per_km),
        bpm(detail.avg_bpm),
    );
    if detail.splits.is_empty() {
        println!("No full kilometres.");
        return;
    }
    let best = detail.best_split().map(|s| s.km);
    for split in &detail.splits {
        let marker = if Some(split.km) == best { " *" } else { "" };
        println!(
            "  km {:>3}  {:>7}  {:>5}{marker}",
            split.km,
            format_pace(split.pace_min_per_km),
            bpm(split.avg_heart_rate),
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

    tracing::info!("Opening run history at {}", database_url);
    let store = SqliteRunStore::connect(&database_url).await?;

    match env::args().nth(1) {
        None => print_history(&store.list().await?),
        Some(arg) => {
            let id: i64 = arg.parse().with_context(|| format!("invalid run id {arg:?}"))?;
            let run = store
                .get(id)
                .await?
                .with_context(|| format!("run {id} not found"))?;
            print_detail(&run);
        }
    }

    Ok(())
}
