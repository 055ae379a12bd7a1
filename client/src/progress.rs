use indicatif::{ProgressBar, ProgressStyle};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

const SPARK_WIDTH: usize = 30;
const SPARK_CHARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Recent observed rates, newest last.
#[derive(Debug, Clone)]
pub struct Sparkline {
    rates: VecDeque<f64>,
    width: usize,
}

impl Sparkline {
    pub fn new(width: usize) -> Self {
        Self {
            rates: VecDeque::with_capacity(width),
            width: width.max(1),
        }
    }

    pub fn push(&mut self, rate: f64) {
        if self.rates.len() == self.width {
            self.rates.pop_front();
        }
        self.rates.push_back(rate.max(0.0));
    }

    pub fn render(&self) -> String {
        let max = self.rates.iter().cloned().fold(0.0, f64::max);
        self.rates
            .iter()
            .map(|rate| {
                if max <= 0.0 {
                    return SPARK_CHARS[0];
                }
                let idx = (rate / max * (SPARK_CHARS.len() - 1) as f64).round() as usize;
                SPARK_CHARS[idx.min(SPARK_CHARS.len() - 1)]
            })
            .collect()
    }
}

/// Live success counter plus the terminal indicator that displays its rate.
pub struct Progress {
    counter: Arc<AtomicU64>,
    bar: ProgressBar,
    refresh: JoinHandle<()>,
}

impl Progress {
    pub fn start(period: Duration, visible: bool) -> Self {
        let counter = Arc::new(AtomicU64::new(0));
        let bar = if visible {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{spinner:.cyan} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar
        } else {
            ProgressBar::hidden()
        };

        let refresh = tokio::spawn(refresh_loop(counter.clone(), bar.clone(), period));
        Self {
            counter,
            bar,
            refresh,
        }
    }

    pub fn add(&self, n: u64) {
        self.counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    /// Stops refreshing and clears the indicator. Returns the final count.
    pub async fn stop(self) -> u64 {
        let Progress {
            counter,
            bar,
            refresh,
        } = self;
        refresh.abort();
        let _ = refresh.await;
        bar.finish_and_clear();
        counter.load(Ordering::Relaxed)
    }
}

async fn refresh_loop(counter: Arc<AtomicU64>, bar: ProgressBar, period: Duration) {
    let mut spark = Sparkline::new(SPARK_WIDTH);
    let mut ticks = tokio::time::interval(period);
    let mut last_at = Instant::now();
    let mut last_count = 0;
    ticks.tick().await;

    loop {
        ticks.tick().await;
        let count = counter.load(Ordering::Relaxed);
        let elapsed = last_at.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 {
            count.saturating_sub(last_count) as f64 / elapsed
        } else {
            0.0
        };
        last_at = Instant::now();
        last_count = count;

        spark.push(rate);
        bar.set_message(format!("{} {:.1} rps ({} ok)", spark.render(), rate, count));
        bar.tick();
    }
}
