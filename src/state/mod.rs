use crate::constants::MAX_LOG_LINES;
use crate::conversion::JobState;
use crate::events::{BatchSummary, LogLine, ProgressEvent, TotalProgress};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared between the UI thread and the batch worker. Holds the
/// single-flight guard and the cancel request.
#[derive(Debug, Default)]
pub struct BatchRunState {
    active: AtomicBool,
    cancel_requested: AtomicBool,
}

impl BatchRunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_begin(self: &Arc<Self>) -> Option<RunGuard> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        self.cancel_requested.store(false, Ordering::Release);
        Some(RunGuard {
            state: Arc::clone(self),
        })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::Release);
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::Acquire)
    }
}

/// Releases the single-flight guard when dropped.
#[derive(Debug)]
pub struct RunGuard {
    state: Arc<BatchRunState>,
}

impl RunGuard {
    pub fn state(&self) -> &BatchRunState {
        &self.state
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.state.active.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone)]
pub struct BatchView {
    pub status: String,
    pub log: VecDeque<LogLine>,
    pub current_file: Option<String>,
    pub file_in_progress: bool,
    pub progress: TotalProgress,
    pub job_states: Vec<JobState>,
    pub summary: Option<BatchSummary>,
}

impl Default for BatchView {
    fn default() -> Self {
        Self {
            status: "Ready".to_string(),
            log: VecDeque::new(),
            current_file: None,
            file_in_progress: false,
            progress: TotalProgress::default(),
            job_states: Vec::new(),
            summary: None,
        }
    }
}

impl BatchView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_log(&mut self, line: LogLine) {
        self.log.push_back(line);
        while self.log.len() > MAX_LOG_LINES {
            self.log.pop_front();
        }
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    // The log survives between runs.
    pub fn begin_run(&mut self, total: usize) {
        self.current_file = None;
        self.file_in_progress = false;
        self.progress = TotalProgress { completed: 0, total };
        self.job_states = vec![JobState::Pending; total];
        self.summary = None;
        self.set_status(format!("Converting {} file(s)...", total));
    }

    pub fn apply(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::LogAppended(line) => self.push_log(line),
            ProgressEvent::CurrentFileChanged {
                index,
                total,
                file_name,
            } => {
                self.set_status(format!("Converting [{}/{}]", index + 1, total));
                if let Some(state) = self.job_states.get_mut(index) {
                    *state = JobState::Running;
                }
                self.current_file = Some(file_name);
            }
            ProgressEvent::FileProgressStarted => self.file_in_progress = true,
            ProgressEvent::FileProgressStopped => self.file_in_progress = false,
            ProgressEvent::JobFinished { index, state } => {
                if let Some(slot) = self.job_states.get_mut(index) {
                    *slot = state;
                }
            }
            ProgressEvent::TotalProgress(progress) => {
                // Never move the bar backwards.
                if progress.completed >= self.progress.completed {
                    self.progress = progress;
                }
            }
            ProgressEvent::BatchFinished(summary) => {
                self.current_file = None;
                self.file_in_progress = false;
                self.set_status(summary.status_line());
                self.push_log(LogLine::info(format!(
                    "{}\nConversion finished! Total: {} file(s)\n✅ Succeeded: {}\n❌ Failed: {}\n{}",
                    "=".repeat(50),
                    summary.total,
                    summary.succeeded,
                    summary.failed,
                    "=".repeat(50)
                )));
                self.summary = Some(summary);
            }
        }
    }

    pub fn dismiss_summary(&mut self) {
        self.summary = None;
    }
}
