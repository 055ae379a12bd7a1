//! Terminal rendering of a finished run.

use crate::aggregate::{Point, Summary};
use crate::run::Report;
use colored::Colorize;
use hdrhistogram::Histogram;
use std::io::{self, Write};
use std::time::{Duration, UNIX_EPOCH};

const BAR_WIDTH: usize = 40;
const LOWEST_US: u64 = 1;
const HIGHEST_US: u64 = 600_000_000;
const SIGFIG: u8 = 3;

/// One power-of-two slice of the latency distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    pub lower: Duration,
    pub upper: Duration,
    pub count: u64,
}

pub fn render<W: Write>(report: &Report, out: &mut W) -> io::Result<()> {
    writeln!(out, "{}", ">> requests per timestamps".bold())?;
    write_timeseries(&report.points, out)?;

    writeln!(out, "{}", ">> requests time distribution".bold())?;
    write_histogram(&latency_buckets(&report.latencies), out)?;

    write_summary(report.summary(), out)?;
    writeln!(
        out,
        ">> admitted {}, discarded {}, ok {}, errors {} in {}",
        report.admission.admitted,
        report.admission.discarded,
        report.successes(),
        report.errors,
        fmt_latency(report.elapsed),
    )
}

pub fn write_timeseries<W: Write>(points: &[Point], out: &mut W) -> io::Result<()> {
    let max = points.iter().map(|p| p.count).max().unwrap_or(0);
    for point in points {
        writeln!(
            out,
            "{} | {:<width$} {} req/s",
            fmt_second(point.second),
            bar(point.count, max),
            point.count,
            width = BAR_WIDTH,
        )?;
    }
    Ok(())
}

pub fn write_histogram<W: Write>(buckets: &[Bucket], out: &mut W) -> io::Result<()> {
    let max = buckets.iter().map(|b| b.count).max().unwrap_or(0);
    for b in buckets {
        writeln!(
            out,
            "{:>14} - {:<14} | {:<width$} {}",
            fmt_latency(b.lower),
            fmt_latency(b.upper),
            bar(b.count, max),
            b.count,
            width = BAR_WIDTH,
        )?;
    }
    Ok(())
}

pub fn write_summary<W: Write>(summary: Option<Summary>, out: &mut W) -> io::Result<()> {
    let Some(s) = summary else {
        return writeln!(out, ">> no data");
    };
    writeln!(out, ">> fastest: {}", fmt_latency(s.fastest).truecolor(128, 255, 128))?;
    writeln!(out, ">>  median: {}", fmt_latency(s.median).truecolor(128, 128, 255))?;
    writeln!(out, ">> slowest: {}", fmt_latency(s.slowest).truecolor(255, 128, 128))
}

/// Groups latencies into buckets whose bounds double, skipping empty ones.
pub fn latency_buckets(latencies: &[Duration]) -> Vec<Bucket> {
    let Ok(mut hist) = Histogram::<u64>::new_with_bounds(LOWEST_US, HIGHEST_US, SIGFIG) else {
        return Vec::new();
    };
    for latency in latencies {
        let us = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        hist.saturating_record(us.max(LOWEST_US));
    }
    if hist.len() == 0 {
        return Vec::new();
    }

    let mut buckets = Vec::new();
    let mut lower = 0;
    for step in hist.iter_log(LOWEST_US, 2.0) {
        let upper = step.value_iterated_to();
        let count = step.count_since_last_iteration();
        if count > 0 {
            buckets.push(Bucket {
                lower: Duration::from_micros(lower),
                upper: Duration::from_micros(upper),
                count,
            });
        }
        lower = upper;
    }
    buckets
}

fn bar(value: u64, max: u64) -> String {
    if max == 0 || value == 0 {
        return String::new();
    }
    let len = (value as f64 / max as f64 * BAR_WIDTH as f64).round() as usize;
    "#".repeat(len.clamp(1, BAR_WIDTH))
}

fn fmt_second(second: i64) -> String {
    match u64::try_from(second) {
        Ok(s) => humantime::format_rfc3339_seconds(UNIX_EPOCH + Duration::from_secs(s)).to_string(),
        Err(_) => second.to_string(),
    }
}

/// Latency rounded to whole microseconds.
fn fmt_latency(d: Duration) -> String {
    let us = u64::try_from(d.as_micros()).unwrap_or(u64::MAX);
    humantime::format_duration(Duration::from_micros(us)).to_string()
}
