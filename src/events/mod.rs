use crate::conversion::JobState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub level: LogLevel,
    pub message: String,
}

impl LogLine {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TotalProgress {
    pub completed: usize,
    pub total: usize,
}

impl TotalProgress {
    pub fn percentage(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        (100 * self.completed) as f32 / self.total as f32
    }

    pub fn fraction(&self) -> f32 {
        self.percentage() / 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn is_fully_completed(&self) -> bool {
        self.failed == 0
    }

    pub fn title(&self) -> &'static str {
        if self.is_fully_completed() {
            "Completed"
        } else {
            "Partially completed"
        }
    }

    pub fn status_line(&self) -> String {
        if self.succeeded > 0 {
            format!("✅ Done - succeeded: {}, failed: {}", self.succeeded, self.failed)
        } else {
            "❌ All conversions failed".to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    LogAppended(LogLine),
    CurrentFileChanged {
        index: usize,
        total: usize,
        file_name: String,
    },
    FileProgressStarted,
    FileProgressStopped,
    JobFinished {
        index: usize,
        state: JobState,
    },
    TotalProgress(TotalProgress),
    BatchFinished(BatchSummary),
}

pub type EventSender = tokio::sync::mpsc::UnboundedSender<ProgressEvent>;
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<ProgressEvent>;

pub fn create_event_channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}
