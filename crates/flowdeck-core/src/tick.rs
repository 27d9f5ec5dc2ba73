use crate::model::TickInfo;
use chrono::{DateTime, Utc};
use tracing::warn;

const DEFAULT_TICK_LENGTH_MS: i64 = 1000;

/// Converts between competition ticks and wall-clock milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickClock {
    start_ms: i64,
    tick_length_ms: i64,
}

impl Default for TickClock {
    fn default() -> Self {
        Self {
            start_ms: 0,
            tick_length_ms: DEFAULT_TICK_LENGTH_MS,
        }
    }
}

impl TickClock {
    pub fn new(start: DateTime<Utc>, tick_length_ms: i64) -> Self {
        Self {
            start_ms: start.timestamp_millis(),
            tick_length_ms: tick_length_ms.max(1),
        }
    }

    pub fn from_info(info: &TickInfo) -> Self {
        let raw = info.start_date.trim();
        let parsed = DateTime::parse_from_rfc3339(raw)
            .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M%:z"));
        match parsed {
            Ok(start) => Self::new(start.with_timezone(&Utc), info.tick_length),
            Err(err) => {
                warn!("tick_info_start_date_invalid: {} ({err})", info.start_date);
                Self {
                    tick_length_ms: info.tick_length.max(1),
                    ..Self::default()
                }
            }
        }
    }

    pub fn tick_length_ms(&self) -> i64 {
        self.tick_length_ms
    }

    /// Tick 0 means "no bound".
    pub fn tick_to_unix_ms(&self, tick: i64) -> Option<i64> {
        if tick == 0 {
            return None;
        }
        Some(self.start_ms + self.tick_length_ms * tick)
    }

    pub fn unix_ms_to_tick(&self, unix_ms: i64) -> i64 {
        (unix_ms - self.start_ms).div_euclid(self.tick_length_ms)
    }

    pub fn current_tick(&self, now: DateTime<Utc>) -> i64 {
        self.unix_ms_to_tick(now.timestamp_millis())
    }

    /// `(from_ms, to_ms)` covering the last `n` ticks plus the running one.
    pub fn last_n_ticks(&self, n: i64, now: DateTime<Utc>) -> (Option<i64>, Option<i64>) {
        let current = self.current_tick(now);
        (
            self.tick_to_unix_ms(current - n),
            self.tick_to_unix_ms(current + 1),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn clock() -> TickClock {
        TickClock::from_info(&TickInfo {
            start_date: "2026-01-01T10:00:00Z".to_string(),
            tick_length: 120_000,
        })
    }

    fn at(offset_ms: i64) -> DateTime<Utc> {
        let base = Utc
            .with_ymd_and_hms(2026, 1, 1, 10, 0, 0)
            .single()
            .expect("valid test timestamp");
        base + chrono::Duration::milliseconds(offset_ms)
    }

    #[test]
    fn ticks_floor_towards_start() {
        let clock = clock();
        assert_eq!(clock.current_tick(at(0)), 0);
        assert_eq!(clock.current_tick(at(119_999)), 0);
        assert_eq!(clock.current_tick(at(120_000)), 1);
        assert_eq!(clock.current_tick(at(-1)), -1);
    }

    #[test]
    fn tick_zero_clears_bound() {
        let clock = clock();
        assert_eq!(clock.tick_to_unix_ms(0), None);
        assert_eq!(clock.tick_to_unix_ms(3), Some(at(360_000).timestamp_millis()));
    }

    #[test]
    fn last_n_ticks_spans_running_tick() {
        let clock = clock();
        let (from, to) = clock.last_n_ticks(5, at(10 * 120_000 + 30));
        assert_eq!(from, Some(at(5 * 120_000).timestamp_millis()));
        assert_eq!(to, Some(at(11 * 120_000).timestamp_millis()));
    }

    #[test]
    fn invalid_start_date_keeps_tick_length() {
        let clock = TickClock::from_info(&TickInfo {
            start_date: "yesterday".to_string(),
            tick_length: 60_000,
        });
        assert_eq!(clock.tick_length_ms(), 60_000);
        assert_eq!(clock.unix_ms_to_tick(120_000), 2);
    }
}
