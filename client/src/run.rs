//! Run controller: owns the deadline, drives the aggregation loop and
//! coordinates shutdown of the pool.

use crate::admission::{self, AdmissionStats, JobQueue};
use crate::aggregate::{unix_second, Aggregator, Point, Summary};
use crate::config::Config;
use crate::error::MonitorError;
use crate::progress::Progress;
use crate::worker::{self, Outcomes};
use futures::future::join_all;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Final report data handed to the renderers.
#[derive(Debug, Clone)]
pub struct Report {
    pub points: Vec<Point>,
    pub latencies: Vec<Duration>,
    pub admission: AdmissionStats,
    pub errors: u64,
    pub elapsed: Duration,
}

impl Report {
    pub fn successes(&self) -> u64 {
        self.latencies.len() as u64
    }

    pub fn summary(&self) -> Option<Summary> {
        Summary::from_samples(&self.latencies)
    }
}

pub struct Monitor {
    config: Config,
    client: reqwest::Client,
}

impl Monitor {
    pub fn new(config: Config) -> Result<Self, MonitorError> {
        config.validate()?;
        let client = worker::client(&config)?;
        Ok(Self { config, client })
    }

    pub async fn run(&self) -> Report {
        let config = &self.config;
        let started = Instant::now();
        tracing::info!(
            url = %config.target,
            duration = %humantime::format_duration(config.duration),
            max_rps = config.max_rps,
            concurrency = config.concurrency,
            "starting run"
        );

        let (mut jobs, job_rx) = JobQueue::new(config.concurrency);
        let (success_tx, mut successes) = mpsc::channel(config.concurrency * 2);
        let (error_tx, mut errors) = mpsc::channel(config.concurrency * 2);
        let outcomes = Outcomes {
            successes: success_tx,
            errors: error_tx,
        };
        let workers = worker::spawn_workers(config, &self.client, &job_rx, &outcomes);
        // workers hold the only senders from here on
        drop(outcomes);
        drop(job_rx);

        let mut ticks = admission::ticker(config.job_interval());
        let deadline = tokio::time::sleep(config.duration);
        tokio::pin!(deadline);

        let progress = Progress::start(config.progress_interval(), config.progress);
        let mut agg = Aggregator::new();

        loop {
            tokio::select! {
                Some(latency) = successes.recv() => {
                    progress.add(1);
                    agg.record_success(latency, unix_second());
                }
                _ = ticks.tick() => {
                    jobs.try_admit();
                }
                Some(err) = errors.recv() => {
                    tracing::warn!(error = %err, "request failed");
                    agg.record_error();
                }
                _ = &mut deadline => break,
            }
        }

        let admission = jobs.close();
        progress.stop().await;
        let settled = agg.successes() + agg.errors();
        tracing::debug!(
            in_flight = admission.admitted.saturating_sub(settled),
            "deadline reached, draining workers"
        );

        // in-flight requests still report; consume until every worker has hung up
        loop {
            tokio::select! {
                Some(latency) = successes.recv() => {
                    agg.record_success(latency, unix_second());
                }
                Some(err) = errors.recv() => {
                    tracing::warn!(error = %err, "request failed");
                    agg.record_error();
                }
                else => break,
            }
        }
        for res in join_all(workers).await {
            if let Err(e) = res {
                tracing::error!(error = %e, "worker task failed");
            }
        }

        let out = agg.finish();
        let report = Report {
            points: out.points,
            latencies: out.latencies,
            admission,
            errors: out.errors,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            admitted = report.admission.admitted,
            discarded = report.admission.discarded,
            successes = report.successes(),
            errors = report.errors,
            "run finished"
        );
        report
    }
}
