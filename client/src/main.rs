use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use monitor::{Config, Monitor, MonitorError};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Hit a URL at a bounded rate and report throughput and latency", long_about = None)]
struct Args {
    /// Duration of the test
    #[arg(long, default_value = "10s", value_parser = humantime::parse_duration)]
    dur: Duration,

    /// Max requests per second
    #[arg(long, default_value_t = 10.0)]
    rps: f64,

    /// Concurrent requests
    #[arg(long, default_value_t = 1)]
    conc: usize,

    /// Target to test, must be a full http://link.com/path
    #[arg(long)]
    tgt: String,

    /// Fetch the body of the response
    #[arg(long)]
    fetch_body: bool,

    /// Per-request timeout
    #[arg(long, default_value = "30s", value_parser = humantime::parse_duration)]
    timeout: Duration,
}

impl Args {
    fn config(&self) -> Result<Config, monitor::ConfigError> {
        let config = Config {
            duration: self.dur,
            max_rps: self.rps,
            concurrency: self.conc,
            fetch_body: self.fetch_body,
            request_timeout: self.timeout,
            ..Config::new(&self.tgt)?
        };
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let monitor = match args.config().map_err(MonitorError::from).and_then(Monitor::new) {
        Ok(monitor) => monitor,
        Err(MonitorError::Config(e)) => Args::command().error(ErrorKind::InvalidValue, e).exit(),
        Err(e) => return Err(e.into()),
    };

    let report = monitor.run().await;
    monitor::report::render(&report, &mut std::io::stdout().lock())?;
    Ok(())
}
