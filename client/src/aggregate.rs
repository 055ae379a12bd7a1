//! Single-consumer aggregation of request outcomes.
//!
//! Wall-clock seconds are passed in by the caller, so the same sequence of
//! outcomes always produces the same series and samples.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Successful requests completed during one wall-clock second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub second: i64,
    pub count: u64,
}

/// Requests-per-second series. Sealed points are never touched again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeSeries {
    sealed: Vec<Point>,
    open: Option<Point>,
}

impl TimeSeries {
    pub fn record(&mut self, second: i64) {
        match self.open {
            // same second, or the clock stepped back
            Some(ref mut open) if second <= open.second => open.count += 1,
            Some(open) => {
                self.sealed.push(open);
                self.open = Some(Point { second, count: 1 });
            }
            None => self.open = Some(Point { second, count: 1 }),
        }
    }

    pub fn sealed(&self) -> &[Point] {
        &self.sealed
    }

    pub fn open(&self) -> Option<Point> {
        self.open
    }

    /// Seals the open point; no further points will be opened.
    pub fn finish(mut self) -> Vec<Point> {
        if let Some(open) = self.open.take() {
            self.sealed.push(open);
        }
        self.sealed
    }
}

#[derive(Debug, Default)]
pub struct Aggregator {
    series: TimeSeries,
    latencies: Vec<Duration>,
    errors: u64,
}

/// What the aggregator holds once the run is over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregate {
    pub points: Vec<Point>,
    pub latencies: Vec<Duration>,
    pub errors: u64,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, latency: Duration, second: i64) {
        self.latencies.push(latency);
        self.series.record(second);
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    pub fn successes(&self) -> u64 {
        self.latencies.len() as u64
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    pub fn series(&self) -> &TimeSeries {
        &self.series
    }

    pub fn finish(self) -> Aggregate {
        Aggregate {
            points: self.series.finish(),
            latencies: self.latencies,
            errors: self.errors,
        }
    }
}

/// Current wall-clock second since the unix epoch.
pub fn unix_second() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub fastest: Duration,
    pub median: Duration,
    pub slowest: Duration,
}

impl Summary {
    /// `None` when there is nothing to summarize. The median is the sample at
    /// position `len / 2` once sorted, never interpolated.
    pub fn from_samples(samples: &[Duration]) -> Option<Summary> {
        let mut sorted = samples.to_vec();
        sorted.sort_unstable();
        Some(Summary {
            fastest: *sorted.first()?,
            median: sorted[sorted.len() / 2],
            slowest: *sorted.last()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn opens_a_point_per_second() {
        let mut agg = Aggregator::new();
        agg.record_success(ms(10), 100);
        agg.record_success(ms(11), 100);
        agg.record_success(ms(12), 101);
        assert_eq!(agg.series().sealed(), &[Point { second: 100, count: 2 }]);
        assert_eq!(agg.series().open(), Some(Point { second: 101, count: 1 }));

        agg.record_success(ms(13), 103);
        let out = agg.finish();
        assert_eq!(
            out.points,
            vec![
                Point { second: 100, count: 2 },
                Point { second: 101, count: 1 },
                Point { second: 103, count: 1 },
            ]
        );
        assert_eq!(out.latencies, vec![ms(10), ms(11), ms(12), ms(13)]);
    }

    #[test]
    fn counts_partition_successes() {
        let mut agg = Aggregator::new();
        let seconds = [5, 5, 5, 6, 8, 8, 9, 9, 9, 9];
        for (i, s) in seconds.iter().enumerate() {
            agg.record_success(ms(i as u64), *s);
            if i % 3 == 0 {
                agg.record_error();
            }
        }
        let out = agg.finish();
        let total: u64 = out.points.iter().map(|p| p.count).sum();
        assert_eq!(total, seconds.len() as u64);
        assert_eq!(out.latencies.len(), seconds.len());
        assert_eq!(out.errors, 4);
        assert!(out.points.windows(2).all(|w| w[0].second < w[1].second));
    }

    #[test]
    fn clock_stepping_back_never_reopens_an_older_second() {
        let mut series = TimeSeries::default();
        series.record(50);
        series.record(49);
        series.record(51);
        assert_eq!(
            series.finish(),
            vec![Point { second: 50, count: 2 }, Point { second: 51, count: 1 }]
        );
    }

    #[test]
    fn replay_is_deterministic() {
        let events: Vec<(Option<Duration>, i64)> = vec![
            (Some(ms(3)), 1),
            (None, 1),
            (Some(ms(7)), 2),
            (Some(ms(1)), 2),
            (None, 4),
            (Some(ms(9)), 4),
        ];
        let replay = || {
            let mut agg = Aggregator::new();
            for (latency, second) in &events {
                match latency {
                    Some(l) => agg.record_success(*l, *second),
                    None => agg.record_error(),
                }
            }
            agg.finish()
        };
        assert_eq!(replay(), replay());
    }

    #[test]
    fn errors_only_leave_series_empty() {
        let mut agg = Aggregator::new();
        for _ in 0..5 {
            agg.record_error();
        }
        let out = agg.finish();
        assert!(out.points.is_empty());
        assert!(out.latencies.is_empty());
        assert_eq!(Summary::from_samples(&out.latencies), None);
    }

    #[test]
    fn summary_uses_sorted_position() {
        let summary = Summary::from_samples(&[ms(40), ms(10), ms(30), ms(20)]).unwrap();
        assert_eq!(summary.fastest, ms(10));
        assert_eq!(summary.median, ms(30));
        assert_eq!(summary.slowest, ms(40));

        let single = Summary::from_samples(&[ms(5)]).unwrap();
        assert_eq!(single, Summary { fastest: ms(5), median: ms(5), slowest: ms(5) });
    }
}
