use crate::conversion::{classify_report, ConversionJob, JobError, JobState, TranscodeError, Transcoder};
use crate::events::{
    create_event_channel, BatchSummary, EventReceiver, EventSender, LogLine, ProgressEvent,
    TotalProgress,
};
use crate::state::{BatchRunState, RunGuard};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ConversionServiceError {
    #[error("No input files selected")]
    EmptyBatch,
    #[error("A conversion is already in progress")]
    Busy,
    #[error("Failed to start conversion worker: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub jobs: Vec<ConversionJob>,
    // None when cancelled
    pub summary: Option<BatchSummary>,
}

pub struct ConversionService<T: Transcoder + 'static> {
    transcoder: Arc<T>,
    run_state: Arc<BatchRunState>,
}

impl<T: Transcoder + 'static> Clone for ConversionService<T> {
    fn clone(&self) -> Self {
        Self {
            transcoder: Arc::clone(&self.transcoder),
            run_state: Arc::clone(&self.run_state),
        }
    }
}

impl<T: Transcoder + 'static> ConversionService<T> {
    pub fn new(transcoder: T) -> Self {
        Self {
            transcoder: Arc::new(transcoder),
            run_state: Arc::new(BatchRunState::new()),
        }
    }

    pub fn transcoder(&self) -> &T {
        &self.transcoder
    }

    pub fn is_running(&self) -> bool {
        self.run_state.is_active()
    }

        pub fn request_cancel(&self) {
        self.run_state.request_cancel();
    }

    pub fn start(&self, inputs: Vec<PathBuf>) -> Result<BatchHandle, ConversionServiceError> {
        if inputs.is_empty() {
            return Err(ConversionServiceError::EmptyBatch);
        }

        let guard = self
            .run_state
            .try_begin()
            .ok_or(ConversionServiceError::Busy)?;

        let run_id = Uuid::new_v4();
        let jobs: Vec<ConversionJob> = inputs.into_iter().map(ConversionJob::new).collect();
        let (sender, receiver) = create_event_channel();
        let transcoder = Arc::clone(&self.transcoder);

        tracing::info!("Starting batch {} with {} file(s)", run_id, jobs.len());

        let worker = thread::Builder::new()
            .name(format!("amv-batch-{}", run_id))
            .spawn(move || run_batch(run_id, jobs, transcoder.as_ref(), guard, &sender))?;

        Ok(BatchHandle {
            run_id,
            events: receiver,
            worker: Some(worker),
            run_state: Arc::clone(&self.run_state),
        })
    }
}

pub struct BatchHandle {
    run_id: Uuid,
    events: EventReceiver,
    worker: Option<JoinHandle<BatchReport>>,
    run_state: Arc<BatchRunState>,
}

impl BatchHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn next_event(&mut self) -> Option<ProgressEvent> {
        self.events.try_recv().ok()
    }

    pub fn drain_events(&mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event() {
            events.push(event);
        }
        events
    }

    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, |worker| worker.is_finished())
    }

    pub fn cancel(&self) {
        self.run_state.request_cancel();
    }

    /// Blocks until the worker exits. Events stay queued for `drain_events`.
    pub fn join(&mut self) -> Option<BatchReport> {
        let worker = self.worker.take()?;
        match worker.join() {
            Ok(report) => Some(report),
            Err(_) => {
                tracing::error!("Batch worker {} panicked", self.run_id);
                None
            }
        }
    }

    pub fn cancel_and_wait(&mut self) -> Option<BatchReport> {
        self.cancel();
        self.join()
    }
}

fn emit(events: &EventSender, event: ProgressEvent) {
    if events.send(event).is_err() {
        tracing::debug!("Progress receiver dropped, event discarded");
    }
}

fn log(events: &EventSender, line: LogLine) {
    emit(events, ProgressEvent::LogAppended(line));
}

pub fn run_batch<T: Transcoder + ?Sized>(
    run_id: Uuid,
    mut jobs: Vec<ConversionJob>,
    transcoder: &T,
    guard: RunGuard,
    events: &EventSender,
) -> BatchReport {
    let total = jobs.len();
    let mut succeeded = 0;
    let mut failed = 0;

    for index in 0..total {
        if guard.state().is_cancel_requested() {
            tracing::info!("Batch {} cancelled before job {}", run_id, index + 1);
            return BatchReport {
                run_id,
                jobs,
                summary: None,
            };
        }

        let job = &mut jobs[index];

        // Re-check the input; it may have vanished since selection

        let result = if !job.input.exists() {
            let error = JobError::MissingInput {
                path: job.input.display().to_string(),
            };
            tracing::warn!("Batch {}: {}", run_id, error);
            log(events, LogLine::error(format!("❌ {}", error)));
            Err(error)
        } else {
            let input_name = job.input_name();
            emit(
                events,
                ProgressEvent::CurrentFileChanged {
                    index,
                    total,
                    file_name: input_name.clone(),
                },
            );
            log(
                events,
                LogLine::info(format!(
                    "📼 Converting [{}/{}]: {}",
                    index + 1,
                    total,
                    input_name
                )),
            );
            emit(events, ProgressEvent::FileProgressStarted);
            job.state = JobState::Running;

            // Run the transcoder and classify its outcome

            let result = match transcoder.transcode(&job.input, &job.output, guard.state()) {
                Ok(report) => classify_report(&report),
                Err(TranscodeError::Cancelled) => {
                    job.state = JobState::Cancelled;
                    emit(events, ProgressEvent::FileProgressStopped);
                    log(
                        events,
                        LogLine::warning(format!("⏹ Cancelled: {}", input_name)),
                    );
                    tracing::info!("Batch {} cancelled during {}", run_id, input_name);
                    return BatchReport {
                        run_id,
                        jobs,
                        summary: None,
                    };
                }
                Err(e) => Err(JobError::LaunchFailure {
                    message: e.to_string(),
                }),
            };

            match &result {
                Ok(()) => {
                    tracing::info!("Batch {}: converted {}", run_id, input_name);
                    log(
                        events,
                        LogLine::success(format!(
                            "✅ Converted: {} → {}",
                            input_name,
                            job.output_name()
                        )),
                    );
                }
                Err(error @ JobError::LaunchFailure { .. }) => {
                    tracing::error!("Batch {}: {} - {}", run_id, input_name, error);
                    log(
                        events,
                        LogLine::error(format!("💥 Execution error: {} - {}", input_name, error)),
                    );
                }
                Err(error) => {
                    tracing::warn!("Batch {}: {} failed - {}", run_id, input_name, error);
                    log(
                        events,
                        LogLine::error(format!("❌ Conversion failed: {} - {}", input_name, error)),
                    );
                }
            }
            result
        };

        // Exactly one job-finished and one aggregate update per job
        match result {
            Ok(()) => succeeded += 1,
            Err(_) => failed += 1,
        }
        let launched = job.state == JobState::Running;
        job.state = JobState::from(result);

        emit(
            events,
            ProgressEvent::JobFinished {
                index,
                state: job.state.clone(),
            },
        );
        if launched {
            emit(events, ProgressEvent::FileProgressStopped);
        }
        emit(
            events,
            ProgressEvent::TotalProgress(TotalProgress {
                completed: index + 1,
                total,
            }),
        );
    }

    let summary = BatchSummary {
        total,
        succeeded,
        failed,
    };
    tracing::info!(
        "Batch {} finished: {} succeeded, {} failed",
        run_id,
        succeeded,
        failed
    );

    // Release the guard first so a consumer reacting to BatchFinished can start again.
    drop(guard);
    emit(events, ProgressEvent::BatchFinished(summary));

    BatchReport {
        run_id,
        jobs,
        summary: Some(summary),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::TranscodeReport;
    use std::collections::HashMap;
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    // Unknown names succeed.
    #[derive(Default)]
    struct ScriptedTranscoder {
        exit_codes: HashMap<String, i32>,
        launch_failures: Vec<String>,
        wait_failures: Vec<String>,
        calls: Mutex<Vec<PathBuf>>,
    }

    impl ScriptedTranscoder {
        fn failing(name: &str, code: i32) -> Self {
            let mut transcoder = Self::default();
            transcoder.exit_codes.insert(name.to_string(), code);
            transcoder
        }

        fn calls(&self) -> Vec<PathBuf> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Transcoder for ScriptedTranscoder {
        fn transcode(
            &self,
            input: &Path,
            _output: &Path,
            _run_state: &BatchRunState,
        ) -> Result<TranscodeReport, TranscodeError> {
            self.calls.lock().unwrap().push(input.to_path_buf());
            let name = input.file_name().unwrap().to_string_lossy().to_string();
            if self.launch_failures.contains(&name) {
                return Err(TranscodeError::Launch {
                    program: "ffmpeg".to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
                });
            }
            if self.wait_failures.contains(&name) {
                return Err(TranscodeError::Wait(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "pipe closed",
                )));
            }
            let code = self.exit_codes.get(&name).copied().unwrap_or(0);
            let stderr = if code == 0 {
                String::new()
            } else {
                format!("Input #0, mov\n[amv] ERROR: bad codec in {}\nConversion failed!", name)
            };
            Ok(TranscodeReport {
                code: Some(code),
                stderr,
            })
        }
    }

    #[derive(Default)]
    struct GateTranscoder {
        entered: AtomicBool,
        released: AtomicBool,
        calls: Mutex<usize>,
    }

    impl GateTranscoder {
        fn wait_until_entered(&self) {
            let deadline = Instant::now() + Duration::from_secs(10);
            while !self.entered.load(Ordering::SeqCst) {
                assert!(Instant::now() < deadline, "transcoder never started");
                thread::sleep(Duration::from_millis(5));
            }
        }
    }

    impl Transcoder for GateTranscoder {
        fn transcode(
            &self,
            _input: &Path,
            _output: &Path,
            run_state: &BatchRunState,
        ) -> Result<TranscodeReport, TranscodeError> {
            *self.calls.lock().unwrap() += 1;
            self.entered.store(true, Ordering::SeqCst);
            loop {
                if run_state.is_cancel_requested() {
                    return Err(TranscodeError::Cancelled);
                }
                if self.released.load(Ordering::SeqCst) {
                    return Ok(TranscodeReport {
                        code: Some(0),
                        stderr: String::new(),
                    });
                }
                thread::sleep(Duration::from_millis(5));
            }
        }
    }

    fn make_inputs(dir: &TempDir, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                fs::write(&path, b"not really a video").unwrap();
                path
            })
            .collect()
    }

    fn run_to_end<T: Transcoder + 'static>(
        service: &ConversionService<T>,
        inputs: Vec<PathBuf>,
    ) -> (BatchReport, Vec<ProgressEvent>) {
        let mut handle = service.start(inputs).unwrap();
        let report = handle.join().unwrap();
        let events = handle.drain_events();
        (report, events)
    }

    fn percentages(events: &[ProgressEvent]) -> Vec<TotalProgress> {
        events
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::TotalProgress(progress) => Some(*progress),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_aggregate_progress_after_each_job() {
        let dir = TempDir::new().unwrap();
        let inputs = make_inputs(&dir, &["1.mp4", "2.mp4", "3.mp4", "4.mp4", "5.mp4", "6.mp4", "7.mp4"]);
        let service = ConversionService::new(ScriptedTranscoder::failing("4.mp4", 1));

        let (_, events) = run_to_end(&service, inputs);
        let progress = percentages(&events);

        assert_eq!(progress.len(), 7);
        for (i, step) in progress.iter().enumerate() {
            assert_eq!(step.completed, i + 1);
            assert_eq!(step.total, 7);
            assert_eq!(step.percentage(), (100 * (i + 1)) as f32 / 7.0);
        }
        assert!(progress.windows(2).all(|w| w[0].percentage() <= w[1].percentage()));
        assert_eq!(progress.last().unwrap().percentage(), 100.0);
    }

    #[test]
    fn test_partial_completion_scenario() {
        let dir = TempDir::new().unwrap();
        let inputs = make_inputs(&dir, &["one.mp4", "two.mp4", "three.mp4"]);
        let service = ConversionService::new(ScriptedTranscoder::failing("two.mp4", 1));

        let (report, events) = run_to_end(&service, inputs);
        let summary = report.summary.unwrap();

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total, 3);
        assert!(!summary.is_fully_completed());
        assert_eq!(summary.title(), "Partially completed");

        assert_eq!(report.jobs[0].state, JobState::Succeeded);
        assert_eq!(
            report.jobs[1].state,
            JobState::Failed(JobError::TranscodeFailure {
                code: Some(1),
                message: "[amv] ERROR: bad codec in two.mp4".to_string(),
            })
        );
        assert_eq!(report.jobs[2].state, JobState::Succeeded);
        assert_eq!(events.last(), Some(&ProgressEvent::BatchFinished(summary)));
        assert!(!service.is_running());
    }

    #[test]
    fn test_missing_input_skips_transcoder() {
        let dir = TempDir::new().unwrap();
        let mut inputs = make_inputs(&dir, &["a.mp4", "c.mp4"]);
        let missing = dir.path().join("b.mp4");
        inputs.insert(1, missing.clone());
        let service = ConversionService::new(ScriptedTranscoder::default());

        let (report, events) = run_to_end(&service, inputs.clone());

        assert_eq!(service.transcoder().calls(), vec![inputs[0].clone(), inputs[2].clone()]);
        assert!(matches!(
            report.jobs[1].state,
            JobState::Failed(JobError::MissingInput { .. })
        ));
        assert_eq!(report.summary.map(|s| (s.succeeded, s.failed)), Some((2, 1)));

        // The skipped job still advances the bar but never shows as current.
        assert_eq!(percentages(&events)[1].completed, 2);
        let current: Vec<usize> = events
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::CurrentFileChanged { index, .. } => Some(*index),
                _ => None,
            })
            .collect();
        assert_eq!(current, vec![0, 2]);
    }

    #[test]
    fn test_launch_failure_is_recorded() {
        let dir = TempDir::new().unwrap();
        let inputs = make_inputs(&dir, &["x.mp4", "y.mp4"]);
        let transcoder = ScriptedTranscoder {
            launch_failures: vec!["x.mp4".to_string()],
            ..Default::default()
        };
        let service = ConversionService::new(transcoder);

        let (report, events) = run_to_end(&service, inputs);

        match &report.jobs[0].state {
            JobState::Failed(JobError::LaunchFailure { message }) => {
                assert!(message.contains("Failed to start ffmpeg"));
            }
            other => panic!("unexpected state {:?}", other),
        }
        assert_eq!(report.jobs[1].state, JobState::Succeeded);
        assert!(events.iter().any(|event| matches!(
            event,
            ProgressEvent::LogAppended(line) if line.message.starts_with("💥 Execution error: x.mp4")
        )));
    }

    #[test]
    fn test_lost_process_is_launch_failure() {
        let dir = TempDir::new().unwrap();
        let inputs = make_inputs(&dir, &["lost.mp4", "next.mp4"]);
        let transcoder = ScriptedTranscoder {
            wait_failures: vec!["lost.mp4".to_string()],
            ..Default::default()
        };
        let service = ConversionService::new(transcoder);

        let (report, events) = run_to_end(&service, inputs);

        match &report.jobs[0].state {
            JobState::Failed(JobError::LaunchFailure { message }) => {
                assert!(message.contains("Lost track of transcoder process"));
            }
            other => panic!("unexpected state {:?}", other),
        }
        assert_eq!(report.jobs[1].state, JobState::Succeeded);
        assert_eq!(report.summary.map(|s| (s.succeeded, s.failed)), Some((1, 1)));
        assert!(events.iter().any(|event| matches!(
            event,
            ProgressEvent::LogAppended(line) if line.message.starts_with("💥 Execution error: lost.mp4")
        )));
    }

    #[test]
    fn test_job_event_order() {
        let dir = TempDir::new().unwrap();
        let inputs = make_inputs(&dir, &["only.mp4"]);
        let service = ConversionService::new(ScriptedTranscoder::default());

        let (_, events) = run_to_end(&service, inputs);
        let kinds: Vec<&str> = events
            .iter()
            .map(|event| match event {
                ProgressEvent::LogAppended(_) => "log",
                ProgressEvent::CurrentFileChanged { .. } => "current",
                ProgressEvent::FileProgressStarted => "started",
                ProgressEvent::FileProgressStopped => "stopped",
                ProgressEvent::JobFinished { .. } => "job",
                ProgressEvent::TotalProgress(_) => "total",
                ProgressEvent::BatchFinished(_) => "finished",
            })
            .collect();

        assert_eq!(
            kinds,
            vec!["current", "log", "started", "log", "job", "stopped", "total", "finished"]
        );
    }

    #[test]
    fn test_every_job_logs_once() {
        let dir = TempDir::new().unwrap();
        let mut inputs = make_inputs(&dir, &["ok.mp4", "bad.mp4"]);
        inputs.push(dir.path().join("missing.mp4"));
        let service = ConversionService::new(ScriptedTranscoder::failing("bad.mp4", 2));

        let (_, events) = run_to_end(&service, inputs);
        let outcome_logs = events
            .iter()
            .filter(|event| match event {
                ProgressEvent::LogAppended(line) => !line.message.starts_with("📼"),
                _ => false,
            })
            .count();
        assert_eq!(outcome_logs, 3);
    }

    #[test]
    fn test_empty_batch_rejected() {
        let service = ConversionService::new(ScriptedTranscoder::default());
        assert!(matches!(
            service.start(Vec::new()),
            Err(ConversionServiceError::EmptyBatch)
        ));
        assert!(!service.is_running());
    }

    #[test]
    fn test_second_run_rejected_while_active() {
        let dir = TempDir::new().unwrap();
        let inputs = make_inputs(&dir, &["first.mp4"]);
        let service = ConversionService::new(GateTranscoder::default());

        let mut handle = service.start(inputs.clone()).unwrap();
        service.transcoder().wait_until_entered();

        assert!(matches!(
            service.start(inputs.clone()),
            Err(ConversionServiceError::Busy)
        ));
        assert!(service.is_running());

        service.transcoder().released.store(true, Ordering::SeqCst);
        let report = handle.join().unwrap();
        assert_eq!(report.summary.map(|s| s.succeeded), Some(1));
        assert_eq!(*service.transcoder().calls.lock().unwrap(), 1);

        // Guard is free again once the run ends.
        assert!(!service.is_running());
        let mut again = service.start(inputs).unwrap();
        assert!(again.join().unwrap().summary.is_some());
    }

    #[test]
    fn test_cancel_abandons_remaining_jobs() {
        let dir = TempDir::new().unwrap();
        let inputs = make_inputs(&dir, &["a.mp4", "b.mp4", "c.mp4"]);
        let service = ConversionService::new(GateTranscoder::default());

        let mut handle = service.start(inputs).unwrap();
        service.transcoder().wait_until_entered();

        let report = handle.cancel_and_wait().unwrap();
        let events = handle.drain_events();

        assert!(report.summary.is_none());
        assert_eq!(report.jobs[0].state, JobState::Cancelled);
        assert_eq!(report.jobs[1].state, JobState::Pending);
        assert_eq!(report.jobs[2].state, JobState::Pending);
        assert_eq!(*service.transcoder().calls.lock().unwrap(), 1);
        assert!(!events
            .iter()
            .any(|event| matches!(event, ProgressEvent::BatchFinished(_))));
        assert!(percentages(&events).is_empty());
        assert!(!service.is_running());
    }

    #[test]
    fn test_outputs_follow_inputs() {
        let dir = TempDir::new().unwrap();
        let inputs = make_inputs(&dir, &["clip.mp4", "a.b.mp4", "old.amv"]);
        let service = ConversionService::new(ScriptedTranscoder::default());

        let (report, _) = run_to_end(&service, inputs);
        assert_eq!(report.jobs[0].output, dir.path().join("clip.amv"));
        assert_eq!(report.jobs[1].output, dir.path().join("a.b.amv"));
        // An .amv input is handed to the transcoder as its own output.
        assert_eq!(report.jobs[2].output, report.jobs[2].input);
    }
}
