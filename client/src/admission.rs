//! Job ticker and admitter.
//!
//! Ticks arrive at a fixed cadence from a steady timer. Each tick tries to
//! hand one job signal to a worker that is already waiting for one; when no
//! worker is waiting the tick is dropped. Demand is never queued, so a slow
//! pool cannot build up a backlog and the observed rate self-limits to
//! `max_rps` and to the number of workers.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Permission to perform exactly one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Job;

/// Counters kept by the admitter over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdmissionStats {
    pub ticks: u64,
    pub admitted: u64,
    pub discarded: u64,
}

/// Steady ticker. The first tick fires one `period` after creation and
/// missed ticks are skipped rather than replayed in a burst.
pub fn ticker(period: Duration) -> Interval {
    let mut ticks = interval_at(Instant::now() + period, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticks
}

/// Admitting half of the job hand-off.
#[derive(Debug)]
pub struct JobQueue {
    idle: Arc<Semaphore>,
    tx: mpsc::Sender<Job>,
    stats: AdmissionStats,
}

/// Worker half of the job hand-off, shared by every worker in the pool.
#[derive(Debug, Clone)]
pub struct JobReceiver {
    idle: Arc<Semaphore>,
    rx: Arc<Mutex<mpsc::Receiver<Job>>>,
}

impl JobQueue {
    /// Creates a hand-off for a pool of `workers` workers.
    pub fn new(workers: usize) -> (JobQueue, JobReceiver) {
        let idle = Arc::new(Semaphore::new(0));
        // one idle permit per waiting worker bounds what can sit in the channel
        let (tx, rx) = mpsc::channel(workers.max(1));
        let queue = JobQueue {
            idle: idle.clone(),
            tx,
            stats: AdmissionStats::default(),
        };
        let receiver = JobReceiver {
            idle,
            rx: Arc::new(Mutex::new(rx)),
        };
        (queue, receiver)
    }

    /// Tries to hand one job to a waiting worker without blocking.
    /// Returns `false` when the tick was discarded.
    pub fn try_admit(&mut self) -> bool {
        self.stats.ticks += 1;

        let admitted = match self.idle.try_acquire() {
            Ok(permit) => {
                permit.forget();
                self.tx.try_send(Job).is_ok()
            }
            Err(_) => false,
        };

        if admitted {
            self.stats.admitted += 1;
        } else {
            self.stats.discarded += 1;
            tracing::debug!("no idle worker, tick discarded");
        }
        admitted
    }

    pub fn stats(&self) -> AdmissionStats {
        self.stats
    }

    /// Stops admissions. Jobs already handed off are still delivered;
    /// afterwards every [`JobReceiver::next`] returns `None`.
    pub fn close(self) -> AdmissionStats {
        self.idle.close();
        self.stats
    }
}

impl JobReceiver {
    /// Waits for the next job. `None` once the queue is closed and drained.
    pub async fn next(&self) -> Option<Job> {
        // one permit per worker committed to a receive; every idle worker is
        // visible to the admitter, not just the one holding the receiver
        self.idle.add_permits(1);
        self.rx.lock().await.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn discards_when_no_worker_waits() {
        let (mut queue, _workers) = JobQueue::new(4);
        assert!(!queue.try_admit());
        assert!(!queue.try_admit());
        assert_eq!(
            queue.stats(),
            AdmissionStats {
                ticks: 2,
                admitted: 0,
                discarded: 2
            }
        );
    }

    #[tokio::test]
    async fn hands_off_to_waiting_worker_only_once() {
        let (mut queue, workers) = JobQueue::new(1);
        let worker = tokio::spawn(async move { workers.next().await });
        // let the worker park on the channel
        tokio::task::yield_now().await;
        while queue.idle.available_permits() == 0 {
            tokio::task::yield_now().await;
        }

        assert!(queue.try_admit());
        // the single worker is now busy, nobody is waiting
        assert!(!queue.try_admit());
        assert_eq!(worker.await.unwrap(), Some(Job));
        assert_eq!(queue.stats().admitted, 1);
        assert_eq!(queue.stats().discarded, 1);
    }

    #[tokio::test]
    async fn every_idle_worker_can_take_a_tick() {
        let (mut queue, workers) = JobQueue::new(3);
        let pool: Vec<_> = (0..3)
            .map(|_| {
                let jobs = workers.clone();
                tokio::spawn(async move { jobs.next().await })
            })
            .collect();
        while queue.idle.available_permits() < 3 {
            tokio::task::yield_now().await;
        }

        // back-to-back ticks, no chance for workers to run in between
        assert!(queue.try_admit());
        assert!(queue.try_admit());
        assert!(queue.try_admit());
        assert!(!queue.try_admit());

        for worker in pool {
            assert_eq!(worker.await.unwrap(), Some(Job));
        }
        assert_eq!(
            queue.stats(),
            AdmissionStats {
                ticks: 4,
                admitted: 3,
                discarded: 1
            }
        );
    }

    #[tokio::test]
    async fn close_drains_then_ends() {
        let (mut queue, workers) = JobQueue::new(2);
        let waiter = workers.clone();
        let worker = tokio::spawn(async move { waiter.next().await });
        while queue.idle.available_permits() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(queue.try_admit());

        let stats = queue.close();
        assert_eq!(stats.admitted, 1);
        assert_eq!(worker.await.unwrap(), Some(Job));
        assert_eq!(workers.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_fires_after_one_period() {
        let start = Instant::now();
        let mut ticks = ticker(Duration::from_millis(100));
        ticks.tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(100));
        ticks.tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(200));
    }
}
