use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, TimeDelta};
use tokio_util::sync::CancellationToken;
use ulid::Ulid;

use slotgrid::engine::{Engine, EngineError, NewAppointment, RangeQuery};
use slotgrid::model::*;
use slotgrid::store::InMemoryBookingStore;

const DOCTORS: usize = 20;
const WEEKS: i64 = 12;

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.3}ms, p50={:.3}ms, p95={:.3}ms, p99={:.3}ms, max={:.3}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().map_or(0.0, |d| d.as_secs_f64() * 1000.0),
    );
}

fn first_monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 1, 7).unwrap()
}

/// Every doctor gets a 45-minute appointment every other hour, Monday to Saturday.
fn setup() -> (Arc<InMemoryBookingStore>, Vec<Ulid>) {
    let doctors: Vec<Ulid> = (0..DOCTORS).map(|_| Ulid::new()).collect();
    let mut records = Vec::new();
    for &doctor in &doctors {
        for day in 0..WEEKS * 7 {
            let date = first_monday() + TimeDelta::days(day);
            if day % 7 == 6 {
                continue;
            }
            for hour in (8..20).step_by(2) {
                records.push(AppointmentRecord {
                    id: Ulid::new(),
                    doctor_id: doctor,
                    start_time: format!("{date}T{hour:02}:00:00"),
                    duration_minutes: Some(45),
                    status: AppointmentStatus::Scheduled,
                    patient_display_name: "Bench Patient".into(),
                    reason_text: "Load".into(),
                });
            }
        }
    }
    println!("  seeded {} appointments for {DOCTORS} doctors", records.len());
    let store = InMemoryBookingStore::from_records(records).unwrap();
    (Arc::new(store), doctors)
}

async fn phase1_week_views(engine: &Engine, doctors: &[Ulid]) {
    let now = first_monday().and_hms_opt(0, 0, 0).unwrap();
    let cancel = CancellationToken::new();
    let mut slot_latencies = Vec::new();
    let mut block_latencies = Vec::new();

    let start = Instant::now();
    for (i, &doctor) in doctors.iter().enumerate() {
        for w in 0..WEEKS {
            let range = DateRange::week_of(first_monday()).shift_weeks(w);
            let query = RangeQuery::new(doctor, range).at(now);

            let t = Instant::now();
            engine.slot_availability(&query, &cancel).await.unwrap();
            slot_latencies.push(t.elapsed());

            let t = Instant::now();
            engine
                .booking_blocks(&query, 30 + 15 * (i as i64 % 6), &cancel)
                .await
                .unwrap();
            block_latencies.push(t.elapsed());
        }
    }
    let elapsed = start.elapsed();
    let n = slot_latencies.len() + block_latencies.len();
    println!(
        "  {n} week queries in {:.2}s = {:.0} queries/sec",
        elapsed.as_secs_f64(),
        n as f64 / elapsed.as_secs_f64()
    );
    print_latency("slot view latency", &mut slot_latencies);
    print_latency("block view latency", &mut block_latencies);
}

async fn phase2_contended_commits(engine: Arc<Engine>, doctors: &[Ulid]) {
    let now = first_monday().and_hms_opt(0, 0, 0).unwrap();
    let n_tasks = 32;
    let mut handles = Vec::new();

    let start = Instant::now();
    for i in 0..n_tasks {
        let engine = engine.clone();
        let doctor = doctors[i % 4];
        handles.push(tokio::spawn(async move {
            let mut latencies = Vec::new();
            let mut committed = 0usize;
            for day in 0..WEEKS * 7 {
                let date = first_monday() + TimeDelta::days(day);
                let request = NewAppointment {
                    doctor_id: doctor,
                    start_time: date.and_hms_opt(9, 0, 0).unwrap(),
                    duration_minutes: 60,
                    patient_display_name: format!("task {i}"),
                    reason_text: String::new(),
                };
                let t = Instant::now();
                match engine.commit_appointment(request, Some(now)).await {
                    Ok(_) => committed += 1,
                    Err(EngineError::NotFeasible { .. }) => {}
                    Err(e) => panic!("commit failed: {e}"),
                }
                latencies.push(t.elapsed());
            }
            (committed, latencies)
        }));
    }

    let mut committed = 0;
    let mut latencies = Vec::new();
    for h in handles {
        let (c, l) = h.await.unwrap();
        committed += c;
        latencies.extend(l);
    }
    let elapsed = start.elapsed();
    println!(
        "  {} commit attempts, {committed} committed in {:.2}s",
        latencies.len(),
        elapsed.as_secs_f64()
    );
    print_latency("commit latency", &mut latencies);
}

#[tokio::main]
async fn main() {
    println!("slotgrid stress bench");

    println!("\nsetup");
    let (store, doctors) = setup();
    let engine = Arc::new(Engine::new(store, WorkingHoursPolicy::default()));

    println!("\nphase 1: week views");
    phase1_week_views(&engine, &doctors).await;

    println!("\nphase 2: contended commits");
    phase2_contended_commits(engine, &doctors).await;
}
