use crate::error::ConfigError;
use std::time::Duration;
use url::Url;

pub const DEFAULT_DURATION: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_RPS: f64 = 10.0;
pub const DEFAULT_CONCURRENCY: usize = 1;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const MAX_JOB_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
const MIN_PROGRESS_INTERVAL: Duration = Duration::from_millis(30);
const MAX_PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Everything a run needs. Build with [`Config::new`], then adjust the public fields.
#[derive(Debug, Clone)]
pub struct Config {
    pub target: Url,
    pub duration: Duration,
    pub max_rps: f64,
    pub concurrency: usize,
    pub fetch_body: bool,
    pub request_timeout: Duration,
    pub progress: bool,
}

impl Config {
    pub fn new(target: &str) -> Result<Self, ConfigError> {
        let config = Self {
            target: parse_target(target)?,
            duration: DEFAULT_DURATION,
            max_rps: DEFAULT_MAX_RPS,
            concurrency: DEFAULT_CONCURRENCY,
            fetch_body: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            progress: true,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.target.scheme() {
            "http" | "https" => {}
            other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
        }
        if !self.max_rps.is_finite() || self.max_rps <= 0.0 {
            return Err(ConfigError::InvalidRate(self.max_rps));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.duration.is_zero() {
            return Err(ConfigError::ZeroDuration);
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// Period between admission ticks, `1s / max_rps`.
    pub fn job_interval(&self) -> Duration {
        // interval() panics on a zero period
        Duration::try_from_secs_f64(1.0 / self.max_rps)
            .unwrap_or(MAX_JOB_INTERVAL)
            .clamp(Duration::from_nanos(1), MAX_JOB_INTERVAL)
    }

    /// Refresh period of the live indicator.
    pub fn progress_interval(&self) -> Duration {
        self.job_interval()
            .saturating_mul(2)
            .clamp(MIN_PROGRESS_INTERVAL, MAX_PROGRESS_INTERVAL)
    }

    /// Upper bound on job signals a run can admit: `ceil(duration / job_interval)`.
    pub fn max_admissions(&self) -> u64 {
        (self.duration.as_secs_f64() * self.max_rps).ceil() as u64
    }

    pub(crate) fn idle_connections(&self) -> usize {
        (self.max_rps * 2.0).ceil() as usize
    }
}

fn parse_target(target: &str) -> Result<Url, ConfigError> {
    let target = target.trim();
    if target.is_empty() {
        return Err(ConfigError::EmptyTarget);
    }
    Url::parse(target).map_err(|source| ConfigError::InvalidTarget {
        target: target.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cli_defaults() {
        let config = Config::new("http://localhost:3000/path").unwrap();
        assert_eq!(config.duration, Duration::from_secs(10));
        assert_eq!(config.max_rps, 10.0);
        assert_eq!(config.concurrency, 1);
        assert!(!config.fetch_body);
        assert_eq!(config.job_interval(), Duration::from_millis(100));
    }

    #[test]
    fn rejects_missing_or_relative_target() {
        assert!(matches!(Config::new(""), Err(ConfigError::EmptyTarget)));
        assert!(matches!(Config::new("   "), Err(ConfigError::EmptyTarget)));
        assert!(matches!(
            Config::new("/just/a/path"),
            Err(ConfigError::InvalidTarget { .. })
        ));
        assert!(matches!(
            Config::new("ftp://example.com/file"),
            Err(ConfigError::UnsupportedScheme(s)) if s == "ftp"
        ));
    }

    #[test]
    fn rejects_bad_knobs() {
        let base = Config::new("http://localhost/").unwrap();

        for rps in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let config = Config { max_rps: rps, ..base.clone() };
            assert!(matches!(config.validate(), Err(ConfigError::InvalidRate(_))));
        }

        let config = Config { concurrency: 0, ..base.clone() };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroConcurrency)));

        let config = Config { duration: Duration::ZERO, ..base.clone() };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroDuration)));

        let config = Config { request_timeout: Duration::ZERO, ..base };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroTimeout)));
    }

    #[test]
    fn progress_interval_is_clamped() {
        let base = Config::new("http://localhost/").unwrap();

        let fast = Config { max_rps: 1000.0, ..base.clone() };
        assert_eq!(fast.progress_interval(), Duration::from_millis(30));

        let slow = Config { max_rps: 0.5, ..base.clone() };
        assert_eq!(slow.progress_interval(), Duration::from_secs(1));

        let mid = Config { max_rps: 10.0, ..base };
        assert_eq!(mid.progress_interval(), Duration::from_millis(200));
    }

    #[test]
    fn admission_bound_rounds_up() {
        let config = Config {
            duration: Duration::from_millis(2500),
            max_rps: 3.0,
            ..Config::new("http://localhost/").unwrap()
        };
        assert_eq!(config.max_admissions(), 8);
    }
}
