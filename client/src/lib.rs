//! Bounded-rate HTTP load monitor.
//!
//! A steady ticker admits at most `max_rps` jobs per second to a fixed pool
//! of workers, dropping ticks when no worker is free. Successful latencies
//! are folded into a per-second series and a sample set for the final report.

pub mod admission;
pub mod aggregate;
pub mod config;
pub mod error;
pub mod progress;
pub mod report;
pub mod run;
pub mod worker;

pub use aggregate::{Point, Summary};
pub use config::Config;
pub use error::{ConfigError, MonitorError, RequestError};
pub use run::{Monitor, Report};
