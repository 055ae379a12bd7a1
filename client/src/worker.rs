use crate::admission::JobReceiver;
use crate::config::Config;
use crate::error::RequestError;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use url::Url;

/// Where workers report. Each request produces exactly one message on one of the two channels.
#[derive(Debug, Clone)]
pub struct Outcomes {
    pub successes: mpsc::Sender<Duration>,
    pub errors: mpsc::Sender<RequestError>,
}

pub struct Worker {
    id: usize,
    client: reqwest::Client,
    target: Url,
    fetch_body: bool,
    timeout: Duration,
    jobs: JobReceiver,
    outcomes: Outcomes,
}

impl Worker {
    pub async fn run(self) {
        let mut done = 0u64;
        while self.jobs.next().await.is_some() {
            let sent = match self.fetch().await {
                Ok(latency) => self.outcomes.successes.send(latency).await.is_ok(),
                Err(err) => self.outcomes.errors.send(err).await.is_ok(),
            };
            if !sent {
                break;
            }
            done += 1;
        }
        tracing::debug!(worker = self.id, requests = done, "worker stopped");
    }

    /// One GET, timed from send until the response (and body, if fetched) is released.
    async fn fetch(&self) -> Result<Duration, RequestError> {
        let start = Instant::now();
        let mut resp = self
            .client
            .get(self.target.clone())
            .send()
            .await
            .map_err(|e| RequestError::transport(e, self.timeout))?;

        if self.fetch_body {
            while resp
                .chunk()
                .await
                .map_err(|e| RequestError::body(e, self.timeout))?
                .is_some()
            {}
        }
        drop(resp);

        Ok(start.elapsed())
    }
}

pub fn client(config: &Config) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.request_timeout)
        .pool_max_idle_per_host(config.idle_connections())
        .build()
}

/// Spawns `config.concurrency` workers sharing one job receiver.
pub fn spawn_workers(
    config: &Config,
    client: &reqwest::Client,
    jobs: &JobReceiver,
    outcomes: &Outcomes,
) -> Vec<JoinHandle<()>> {
    (0..config.concurrency)
        .map(|id| {
            let worker = Worker {
                id,
                client: client.clone(),
                target: config.target.clone(),
                fetch_body: config.fetch_body,
                timeout: config.request_timeout,
                jobs: jobs.clone(),
                outcomes: outcomes.clone(),
            };
            tokio::spawn(worker.run())
        })
        .collect()
}
