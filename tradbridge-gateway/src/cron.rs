use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use cron::Schedule;
use tokio::time::{Instant, interval_at};
use tracing::info;

fn utc_minute(now: DateTime<Utc>) -> DateTime<Utc> {
    now.with_second(0)
        .and_then(|dt| dt.with_nanosecond(0))
        .unwrap_or(now)
}

/// Parse a five-field cron expression (minute resolution).
pub fn parse_schedule(expr: &str) -> Result<Schedule, String> {
    Schedule::from_str(&format!("0 {}", expr.trim())).map_err(|e| e.to_string())
}

fn next_due_at_or_after(schedule: &Schedule, now: DateTime<Utc>) -> Option<i64> {
    let now_min = utc_minute(now);
    let prev = now_min - chrono::Duration::minutes(1);
    schedule
        .after(&prev)
        .next()
        .map(|dt| utc_minute(dt).timestamp())
}

fn next_due_after(schedule: &Schedule, base_unix: i64) -> Option<i64> {
    let base = DateTime::from_timestamp(base_unix, 0)?;
    schedule
        .after(&base)
        .next()
        .map(|dt| utc_minute(dt).timestamp())
}

/// Whether the job is due at `now`. `next_due` is the runner's stored due
/// time (unix seconds) and is advanced either way, so a missed slot is
/// skipped rather than run late.
pub fn take_due(next_due: &mut Option<i64>, schedule: &Schedule, now: DateTime<Utc>) -> bool {
    let Some(initial_due) = next_due_at_or_after(schedule, now) else {
        return false;
    };
    let due = *next_due.get_or_insert(initial_due);

    let now_ts = now.timestamp();
    if now_ts >= due && now_ts < due + 60 {
        *next_due = next_due_after(schedule, due);
        true
    } else {
        if now_ts > due {
            *next_due = Some(initial_due);
        }
        false
    }
}

/// Spawn a loop checking `schedule` every `check_seconds` and running `job`
/// when due. Runs never overlap: the next check waits for the job.
pub fn start_cron_runner<F, Fut>(
    name: &'static str,
    schedule: Schedule,
    check_seconds: u64,
    job: F,
) -> tokio::task::JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let mut interval = interval_at(
        Instant::now() + Duration::from_secs(check_seconds),
        Duration::from_secs(check_seconds),
    );

    let handle = tokio::spawn(async move {
        let mut next_due = None;
        loop {
            interval.tick().await;
            if take_due(&mut next_due, &schedule, Utc::now()) {
                info!(job = name, "cron job due");
                job().await;
            }
        }
    });

    info!("cron runner started (job={name}, check_seconds={check_seconds})");
    handle
}
