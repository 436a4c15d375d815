use crate::application::commands::{run_sweep_impl, AppState};
use crate::infrastructure::config::{read_bind_address, read_sweep_schedule, SweepSchedule};
use crate::infrastructure::error::InfraError;
use crate::routes::router;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use tokio::time::sleep;

/// Serve the HTTP trigger endpoints and keep the daily sweep loop running.
pub async fn serve(state: Arc<AppState>) -> Result<(), InfraError> {
    let bind_address = read_bind_address(state.config_dir())?;
    let schedule = read_sweep_schedule(state.config_dir())?;

    tokio::spawn(run_sweep_loop(Arc::clone(&state), schedule));

    let app = router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    state.log_info("serve", &format!("listening on {bind_address}"));
    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_sweep_loop(state: Arc<AppState>, schedule: SweepSchedule) {
    loop {
        let next_run = next_sweep_run(Utc::now(), schedule);
        let sleep_for = (next_run - Utc::now())
            .to_std()
            .unwrap_or_else(|_| std::time::Duration::from_secs(60));
        sleep(sleep_for).await;

        match run_sweep_impl(&state) {
            Ok(response) => state.log_info(
                "sweep_loop",
                &format!("inserted={} purged={}", response.inserted, response.purged),
            ),
            Err(error) => {
                let _ = state.command_error("sweep_loop", &error);
            }
        }
    }
}

/// Next instant the daily sweep fires: today's configured local time if it is
/// still ahead, otherwise the same time tomorrow.
fn next_sweep_run(now: DateTime<Utc>, schedule: SweepSchedule) -> DateTime<Utc> {
    let now_local = now.with_timezone(&schedule.timezone);
    let today = now_local.date_naive();
    let target_local = schedule
        .timezone
        .from_local_datetime(&today.and_time(schedule.time))
        .earliest()
        .unwrap_or_else(|| schedule.timezone.from_utc_datetime(&today.and_time(schedule.time)));

    if now_local < target_local {
        target_local.with_timezone(&Utc)
    } else {
        (target_local + Duration::days(1)).with_timezone(&Utc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn schedule(time: &str, zone: &str) -> SweepSchedule {
        SweepSchedule {
            time: NaiveTime::parse_from_str(time, "%H:%M").expect("valid time"),
            timezone: zone.parse().expect("valid zone"),
        }
    }

    #[test]
    fn fires_later_today_when_target_is_ahead() {
        let next = next_sweep_run(fixed_time("2024-06-15T01:00:00Z"), schedule("02:30", "UTC"));
        assert_eq!(next, fixed_time("2024-06-15T02:30:00Z"));
    }

    #[test]
    fn fires_tomorrow_when_target_has_passed() {
        let next = next_sweep_run(fixed_time("2024-06-15T03:00:00Z"), schedule("02:30", "UTC"));
        assert_eq!(next, fixed_time("2024-06-16T02:30:00Z"));
    }

    #[test]
    fn respects_the_configured_timezone() {
        // 02:30 America/New_York == 06:30Z during EDT.
        let next = next_sweep_run(
            fixed_time("2024-06-15T05:00:00Z"),
            schedule("02:30", "America/New_York"),
        );
        assert_eq!(next, fixed_time("2024-06-15T06:30:00Z"));
    }
}
