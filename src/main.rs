use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;
use ulid::Ulid;

use slotgrid::config::Config;
use slotgrid::engine::{Engine, RangeQuery};
use slotgrid::model::*;
use slotgrid::store::InMemoryBookingStore;

const USAGE: &str = "usage: slotgrid <appointments.json> <doctor-id> <start-date> <end-date> [duration-minutes]";

#[derive(Serialize)]
struct Report {
    days: Vec<DayAvailability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    blocks: Option<Vec<DayBlocks>>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if !(4..=5).contains(&args.len()) {
        eprintln!("{USAGE}");
        std::process::exit(2);
    }

    let config = Config::from_env()?;
    slotgrid::observability::init(config.metrics_port)?;

    let raw = std::fs::read_to_string(&args[0])?;
    let records: Vec<AppointmentRecord> = serde_json::from_str(&raw)?;
    let doctor_id: Ulid = args[1].parse()?;
    let start: NaiveDate = args[2].parse()?;
    let end: NaiveDate = args[3].parse()?;
    let duration: Option<i64> = args.get(4).map(|s| s.parse()).transpose()?;

    info!("loaded {} appointments from {}", records.len(), args[0]);
    info!(
        "  hours: {:02}:00-{:02}:00, every {} min, closed {:?}",
        config.policy.open_hour(),
        config.policy.close_hour(),
        config.policy.granularity_minutes(),
        config.policy.closed_weekdays()
    );

    let store = Arc::new(InMemoryBookingStore::from_records(records)?);
    let engine = Engine::from_config(store, &config);

    let mut query = RangeQuery::new(doctor_id, DateRange::new(start, end));
    if let Some(now) = config.now {
        query = query.at(now);
    }

    // ctrl-c abandons a long range query
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let days = engine.slot_availability(&query, &cancel).await?;
    let blocks = match duration {
        Some(minutes) => Some(engine.booking_blocks(&query, minutes, &cancel).await?),
        None => None,
    };

    println!("{}", serde_json::to_string_pretty(&Report { days, blocks })?);
    Ok(())
}
