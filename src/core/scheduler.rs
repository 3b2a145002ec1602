use std::sync::Arc;
use chrono::{DateTime, Days, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::time::sleep;
use crate::core::acquisition::AcquisitionService;

/// Fires one acquisition cycle per day at a fixed wall-clock time in the
/// reference timezone.
pub struct DailyScheduler {
    service: Arc<AcquisitionService>,
    at: NaiveTime,
    tz: Tz,
    run_on_startup: bool,
}

impl DailyScheduler {
    pub fn new(service: Arc<AcquisitionService>, at: NaiveTime, tz: Tz, run_on_startup: bool) -> Self {
        DailyScheduler { service, at, tz, run_on_startup }
    }

    /// Runs until the task is aborted. Cycle failures are logged and the
    /// loop continues with the next occurrence.
    pub async fn run(self) {
        tracing::info!(
            at = %self.at,
            tz = %self.tz,
            run_on_startup = self.run_on_startup,
            "Starting daily scheduler"
        );

        if self.run_on_startup {
            self.fire("startup").await;
        }

        loop {
            let now = Utc::now();
            let next = next_run(now, self.at, self.tz);
            let wait = (next - now).to_std().unwrap_or_default();
            tracing::info!(next_run = %next.with_timezone(&self.tz), wait_secs = wait.as_secs(), "Next acquisition scheduled");

            sleep(wait).await;
            self.fire("schedule").await;
        }
    }

    async fn fire(&self, reason: &'static str) {
        match self.service.trigger().await {
            Ok(report) => tracing::info!(
                reason,
                calendar_day = %report.snapshot.calendar_day,
                degraded = report.snapshot.degraded,
                "Scheduled acquisition finished"
            ),
            Err(e) => tracing::error!(reason, error = %e, "Scheduled acquisition failed"),
        }
    }
}

/// First instant strictly after `now` whose local time in `tz` is `at`.
///
/// A local time skipped by a DST gap resolves to the instant one hour later;
/// an ambiguous one resolves to its earliest mapping.
pub fn next_run(now: DateTime<Utc>, at: NaiveTime, tz: Tz) -> DateTime<Utc> {
    let today = now.with_timezone(&tz).date_naive();

    for offset in 0..=2u64 {
        let Some(date) = today.checked_add_days(Days::new(offset)) else {
            break;
        };
        let local = date.and_time(at);
        let resolved = tz
            .from_local_datetime(&local)
            .earliest()
            .or_else(|| tz.from_local_datetime(&(local + Duration::hours(1))).earliest());

        if let Some(candidate) = resolved {
            let candidate = candidate.with_timezone(&Utc);
            if candidate > now {
                return candidate;
            }
        }
    }

    now + Duration::days(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Asia::Taipei;
    use chrono_tz::America::New_York;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_next_run_later_today() {
        // 10:00 Taipei
        let now = utc(2025, 12, 1, 2, 0);
        assert_eq!(next_run(now, hm(23, 50), Taipei), utc(2025, 12, 1, 15, 50));
    }

    #[test]
    fn test_next_run_rolls_to_tomorrow() {
        // 23:55 Taipei
        let now = utc(2025, 12, 1, 15, 55);
        assert_eq!(next_run(now, hm(23, 50), Taipei), utc(2025, 12, 2, 15, 50));
    }

    #[test]
    fn test_next_run_strictly_after_now() {
        let now = utc(2025, 12, 1, 15, 50);
        assert_eq!(next_run(now, hm(23, 50), Taipei), utc(2025, 12, 2, 15, 50));
    }

    #[test]
    fn test_next_run_uses_local_date_not_utc_date() {
        // 2025-12-01 20:00 UTC is already 2025-12-02 04:00 in Taipei.
        let now = utc(2025, 12, 1, 20, 0);
        assert_eq!(next_run(now, hm(8, 0), Taipei), utc(2025, 12, 2, 0, 0));
    }

    #[test]
    fn test_next_run_skips_dst_gap() {
        // 2025-03-09 02:30 does not exist in New York; clocks jump to 03:00 EDT.
        let now = utc(2025, 3, 9, 5, 0);
        let next = next_run(now, hm(2, 30), New_York);
        assert_eq!(next, utc(2025, 3, 9, 7, 30));
    }
}
