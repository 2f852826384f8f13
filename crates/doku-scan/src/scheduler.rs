//! Periodic execution of scanners.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::Scanner;

/// How often a loop checks for due jobs and stop requests.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

struct Job {
    scanner: Box<dyn Scanner>,
    interval: Duration,
    next_run: Instant,
}

/// Runs a set of scanners on fixed intervals until cancelled.
///
/// Jobs within one loop run sequentially; a slow scan delays the others.
/// Each job runs once right away, then again `interval` after its previous
/// run finished. A failed scan is logged and retried at the next interval.
pub struct ScanLoop {
    name: String,
    jobs: Vec<Job>,
    poll_interval: Duration,
}

impl ScanLoop {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            jobs: Vec::new(),
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Add a job running `scanner` every `interval`.
    pub fn every(mut self, interval: Duration, scanner: impl Scanner + 'static) -> Self {
        self.jobs.push(Job {
            scanner: Box::new(scanner),
            interval,
            next_run: Instant::now(),
        });
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run every job once, regardless of its schedule.
    pub fn run_once(&mut self, cancel: &CancellationToken) {
        for job in &mut self.jobs {
            if cancel.is_cancelled() {
                break;
            }
            run_job(job, cancel);
        }
    }

    /// Block until `cancel` fires, running jobs as they come due.
    pub fn run(mut self, cancel: &CancellationToken) {
        info!(scan_loop = %self.name, jobs = self.jobs.len(), "scan loop started");

        while !cancel.is_cancelled() {
            for job in &mut self.jobs {
                if cancel.is_cancelled() {
                    break;
                }
                if Instant::now() >= job.next_run {
                    run_job(job, cancel);
                }
            }
            std::thread::sleep(self.poll_interval);
        }

        info!(scan_loop = %self.name, "scan loop stopped");
    }
}

fn run_job(job: &mut Job, cancel: &CancellationToken) {
    let name = job.scanner.name();
    debug!(scanner = name, "scan started");

    match job.scanner.scan(cancel) {
        Ok(summary) if summary.skipped => debug!(scanner = name, "scan skipped"),
        Ok(summary) => debug!(
            scanner = name,
            items = summary.items,
            errors = summary.errors,
            cancelled = summary.cancelled,
            "scan finished"
        ),
        Err(err) => error!(scanner = name, error = %err, "scan failed"),
    }
    job.next_run = Instant::now() + job.interval;
}
