use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::ApiClient;
use crate::error::{Error, Result};
use crate::trigger::{PipelineHandle, ResourceKind};

pub const POLL_INTERVAL: Duration = Duration::from_secs(60);
pub const MAX_WAIT: Duration = Duration::from_secs(3 * 60 * 60);

/// Remote status vocabulary. Parsed from the API's status string; anything
/// outside the documented set lands in `Other` and classifies as failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Created,
    WaitingForResource,
    Preparing,
    Pending,
    Running,
    Success,
    Failed,
    Canceled,
    Skipped,
    Manual,
    Scheduled,
    Other(String),
}

impl Status {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "created" => Status::Created,
            "waiting_for_resource" => Status::WaitingForResource,
            "preparing" => Status::Preparing,
            "pending" => Status::Pending,
            "running" => Status::Running,
            "success" => Status::Success,
            "failed" => Status::Failed,
            "canceled" => Status::Canceled,
            "skipped" => Status::Skipped,
            "manual" => Status::Manual,
            "scheduled" => Status::Scheduled,
            other => Status::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Status::Created => "created",
            Status::WaitingForResource => "waiting_for_resource",
            Status::Preparing => "preparing",
            Status::Pending => "pending",
            Status::Running => "running",
            Status::Success => "success",
            Status::Failed => "failed",
            Status::Canceled => "canceled",
            Status::Skipped => "skipped",
            Status::Manual => "manual",
            Status::Scheduled => "scheduled",
            Status::Other(raw) => raw,
        }
    }

    /// Poll classification. `manual` and `scheduled` need intervention the
    /// watcher cannot assume, so they fail like any unrecognized status.
    pub fn poll_result(&self) -> PollResult {
        match self {
            Status::Created | Status::WaitingForResource | Status::Preparing | Status::Pending => {
                PollResult::Pending
            }
            Status::Running => PollResult::Running,
            Status::Success => PollResult::Success,
            _ => PollResult::Failed,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(
            self.poll_result(),
            PollResult::Pending | PollResult::Running
        )
    }
}

/// Outcome of one poll tick (or of the whole wait, for `TimedOut`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollResult {
    Pending,
    Running,
    Success,
    Failed,
    TimedOut,
}

/// Where the poller reads remote status from. The API client implements it;
/// tests script it.
pub trait StatusFetch {
    fn fetch_status(&self, handle: &PipelineHandle) -> Result<Status>;
}

impl StatusFetch for ApiClient {
    fn fetch_status(&self, handle: &PipelineHandle) -> Result<Status> {
        let raw = match handle.kind {
            ResourceKind::Pipeline => self.pipeline(&handle.project_path, handle.id)?.status,
            ResourceKind::Job => self.job(&handle.project_path, handle.id)?.status,
        };
        Ok(Status::parse(&raw))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitSummary {
    pub status: String,
    pub poll_count: u32,
    pub waited_minutes: i64,
}

/// Synchronous wait loop over a pipeline or job.
///
/// One tick per interval: fetch, classify, then either sleep and continue
/// (in-flight), stop with the summary (success), or stop with an error
/// (failure). A fetch error counts as an in-flight tick, so flaky reads
/// cannot kill a healthy build, and the tick ceiling still bounds the total
/// wait.
pub struct Poller {
    interval: Duration,
    max_ticks: u32,
}

impl Default for Poller {
    fn default() -> Self {
        Self::new()
    }
}

impl Poller {
    pub fn new() -> Self {
        Self {
            interval: POLL_INTERVAL,
            max_ticks: (MAX_WAIT.as_secs() / POLL_INTERVAL.as_secs()) as u32,
        }
    }

    /// Custom timing for short waits.
    pub fn with_timing(interval: Duration, max_ticks: u32) -> Self {
        Self {
            interval,
            max_ticks,
        }
    }

    pub fn wait(&self, source: &impl StatusFetch, handle: &PipelineHandle) -> Result<WaitSummary> {
        log_status!(
            "poll",
            "Waiting for {} on {}",
            handle.describe(),
            handle.project_path
        );

        for tick in 1..=self.max_ticks {
            let status = match source.fetch_status(handle) {
                Ok(status) => status,
                Err(e) => {
                    log_status!(
                        "poll",
                        "Status check failed ({}); treating {} as still running",
                        e,
                        handle.describe()
                    );
                    Status::Running
                }
            };

            match status.poll_result() {
                PollResult::Success => {
                    let waited_minutes = elapsed_minutes(handle.started_at);
                    log_status!(
                        "poll",
                        "{} succeeded after {} minutes",
                        handle.describe(),
                        waited_minutes
                    );
                    return Ok(WaitSummary {
                        status: status.as_str().to_string(),
                        poll_count: tick,
                        waited_minutes,
                    });
                }
                PollResult::Failed => {
                    log_status!(
                        "poll",
                        "{} finished with status '{}'",
                        handle.describe(),
                        status.as_str()
                    );
                    return Err(Error::pipeline_failed(handle.describe(), status.as_str()));
                }
                _ => {
                    log_status!(
                        "poll",
                        "{} is {} (check {} of {})",
                        handle.describe(),
                        status.as_str(),
                        tick,
                        self.max_ticks
                    );
                    std::thread::sleep(self.interval);
                }
            }
        }

        Err(Error::pipeline_timeout(
            handle.describe(),
            elapsed_minutes(handle.started_at),
        ))
    }
}

fn elapsed_minutes(started_at: DateTime<Utc>) -> i64 {
    (Utc::now() - started_at).num_minutes()
}
