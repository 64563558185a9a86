use crate::config::AppConfig;
use crate::constants::FFMPEG_PATH_ENV;
use crate::conversion::FfmpegTranscoder;
use crate::events::{LogLine, ProgressEvent};
use crate::services::{BatchHandle, ConversionService, ConversionServiceError, FileService};
use crate::state::BatchView;
use std::path::PathBuf;

pub struct AmvConverterApp {
    pub config: AppConfig,
    pub service: ConversionService<FfmpegTranscoder>,
    pub files: FileService,
    pub selected_files: Vec<PathBuf>,
    pub view: BatchView,
    pub batch: Option<BatchHandle>,
    pub transcoder_warning: Option<String>,
    pub notice: Option<String>,
    pub show_close_confirmation: bool,
    pub allowed_to_close: bool,
}

impl Default for AmvConverterApp {
    fn default() -> Self {
        Self::new()
    }
}

impl AmvConverterApp {
    pub fn new() -> Self {
        let config = AppConfig::load();
        let service = ConversionService::new(FfmpegTranscoder::from_config(&config));

        let mut app = Self {
            config,
            service,
            files: FileService::new(),
            selected_files: Vec::new(),
            view: BatchView::new(),
            batch: None,
            transcoder_warning: None,
            notice: None,
            show_close_confirmation: false,
            allowed_to_close: false,
        };

        app.check_transcoder();
        app
    }

    fn check_transcoder(&mut self) {
        match self.service.transcoder().probe_version() {
            Ok(version) => {
                tracing::info!("Found FFmpeg {}", version);
                self.transcoder_warning = None;
            }
            Err(e) => {
                tracing::warn!("Transcoder check failed: {:#}", e);
                self.transcoder_warning = Some(format!(
                    "{} could not be run ({:#}). Install FFmpeg or set {}.",
                    self.config.transcoder_path.display(),
                    e,
                    FFMPEG_PATH_ENV
                ));
            }
        }
    }

    pub fn is_converting(&self) -> bool {
        self.batch.is_some() || self.service.is_running()
    }

    pub fn can_start(&self) -> bool {
        !self.is_converting() && !self.selected_files.is_empty()
    }

    pub fn select_files(&mut self) {
        if self.is_converting() {
            self.notice = Some("A conversion is in progress, please wait for it to finish.".to_string());
            return;
        }

        if let Some(picked) = self.files.pick_videos() {
            self.apply_selection(picked);
        }
    }

    pub fn apply_selection(&mut self, picked: Vec<PathBuf>) {
        if picked.is_empty() {
            return;
        }

        let selection = FileService::retain_existing(picked);
        for path in &selection.skipped {
            self.view
                .push_log(LogLine::warning(format!("⚠ Skipping missing file: {}", path.display())));
        }

        self.selected_files = selection.kept;
        let count = self.selected_files.len();
        if count > 0 {
            self.view
                .push_log(LogLine::info(format!("Selected {} valid file(s)", count)));
            self.view.set_status(format!("Loaded {} file(s)", count));
        } else {
            self.notice = Some("No valid video files were selected.".to_string());
        }
    }

    pub fn start_conversion(&mut self) {
        if self.selected_files.is_empty() {
            self.notice = Some("Please select video files first.".to_string());
            return;
        }

        match self.service.start(self.selected_files.clone()) {
            Ok(handle) => {
                self.view.begin_run(self.selected_files.len());
                self.batch = Some(handle);
            }
            Err(ConversionServiceError::Busy) => {
                self.notice = Some("A conversion is already in progress.".to_string());
            }
            Err(e) => {
                tracing::error!("Could not start conversion: {}", e);
                self.notice = Some(e.to_string());
            }
        }
    }

    // Called once per frame
    pub fn update_status(&mut self) {
        let mut finished = false;

        if let Some(batch) = self.batch.as_mut() {
            while let Some(event) = batch.next_event() {
                if matches!(event, ProgressEvent::BatchFinished(_)) {
                    finished = true;
                }
                self.view.apply(event);
            }
            finished |= batch.is_finished() && !self.service.is_running();
        }

        if finished {
            if let Some(mut batch) = self.batch.take() {
                for event in batch.drain_events() {
                    self.view.apply(event);
                }
                if let Some(report) = batch.join() {
                    tracing::debug!(
                        "Batch {} joined: {} job(s), completed: {}",
                        report.run_id,
                        report.jobs.len(),
                        report.summary.is_some()
                    );
                }
            }
        }
    }

    pub fn request_close(&mut self) -> bool {
        if self.allowed_to_close || !self.is_converting() {
            return true;
        }
        self.show_close_confirmation = true;
        false
    }

    pub fn confirm_close(&mut self) {
        self.show_close_confirmation = false;
        self.allowed_to_close = true;
        if let Some(mut batch) = self.batch.take() {
            tracing::info!("Cancelling batch {} on close", batch.run_id());
            batch.cancel_and_wait();
        } else {
            self.service.request_cancel();
        }
    }
}
