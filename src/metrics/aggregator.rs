use chrono::{DateTime, Utc};

use super::types::LiveStats;

/// Per-frame live values. The only running state is the previous frame's timestamp;
/// the unique count comes from the caller's track registry.
#[derive(Debug, Default, Clone)]
pub struct OnlineAggregator {
    previous_timestamp: Option<DateTime<Utc>>,
}

impl OnlineAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(
        &mut self,
        timestamp: DateTime<Utc>,
        object_count: usize,
        unique_object_count: usize,
    ) -> LiveStats {
        let instantaneous_rate = match self.previous_timestamp {
            None => Some(0.0),
            Some(previous) => {
                let elapsed = (timestamp - previous).num_nanoseconds().unwrap_or(i64::MAX);
                (elapsed > 0).then(|| 1_000_000_000.0 / elapsed as f64)
            }
        };
        self.previous_timestamp = Some(timestamp);

        LiveStats {
            object_count,
            instantaneous_rate,
            unique_object_count,
        }
    }

    pub fn reset(&mut self) {
        self.previous_timestamp = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn first_frame_rate_is_zero() {
        let mut agg = OnlineAggregator::new();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let stats = agg.update(t0, 4, 2);
        assert_eq!(
            stats,
            LiveStats {
                object_count: 4,
                instantaneous_rate: Some(0.0),
                unique_object_count: 2,
            }
        );
    }

    #[test]
    fn rate_is_inverse_of_frame_gap() {
        let mut agg = OnlineAggregator::new();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        agg.update(t0, 0, 0);

        let stats = agg.update(t0 + Duration::milliseconds(50), 1, 1);
        let rate = stats.instantaneous_rate.unwrap();
        assert!((rate - 20.0).abs() < 1e-9);
    }

    #[test]
    fn zero_gap_leaves_rate_undefined() {
        let mut agg = OnlineAggregator::new();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        agg.update(t0, 0, 0);
        assert_eq!(agg.update(t0, 0, 0).instantaneous_rate, None);
    }

    #[test]
    fn sub_microsecond_gap_still_has_a_rate() {
        let mut agg = OnlineAggregator::new();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        agg.update(t0, 0, 0);

        let stats = agg.update(t0 + Duration::nanoseconds(500), 0, 0);
        assert_eq!(stats.instantaneous_rate, Some(2_000_000.0));
    }

    #[test]
    fn reset_starts_over() {
        let mut agg = OnlineAggregator::new();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        agg.update(t0, 0, 0);
        agg.reset();
        assert_eq!(
            agg.update(t0 + Duration::seconds(1), 0, 0).instantaneous_rate,
            Some(0.0)
        );
    }
}
