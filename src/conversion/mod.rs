use crate::constants::{
    AMV_AUDIO_CHANNELS, AMV_AUDIO_CODEC, AMV_BLOCK_SIZE, AMV_FRAME_RATE, AMV_SAMPLE_RATE,
    AMV_VIDEO_CODEC, AMV_VIDEO_FILTER, TARGET_EXTENSION, UNKNOWN_ERROR,
};
use regex::Regex;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

pub mod transcoder;

pub use transcoder::{FfmpegTranscoder, TranscodeError, TranscodeReport, Transcoder};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum JobError {
    #[error("Input file not found: {path}")]
    MissingInput { path: String },
    #[error("{message}")]
    TranscodeFailure { code: Option<i32>, message: String },
    #[error("{message}")]
    LaunchFailure { message: String },
}

pub type JobResult = Result<(), JobError>;

#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed(JobError),
    Cancelled,
}

impl From<JobResult> for JobState {
    fn from(result: JobResult) -> Self {
        match result {
            Ok(()) => JobState::Succeeded,
            Err(error) => JobState::Failed(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub state: JobState,
}

impl ConversionJob {
    pub fn new(input: PathBuf) -> Self {
        let output = output_path_for(&input);
        Self {
            input,
            output,
            state: JobState::Pending,
        }
    }

    pub fn input_name(&self) -> String {
        display_name(&self.input)
    }

    pub fn output_name(&self) -> String {
        display_name(&self.output)
    }
}

pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

// Only the final extension changes; an `.amv` input maps onto itself and
// FFmpeg reports that as a failed job.
pub fn output_path_for(input: &Path) -> PathBuf {
    input.with_extension(TARGET_EXTENSION)
}

fn error_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)error|invalid").expect("error pattern is valid"))
}

// First line mentioning an error, else the last non-empty line.
pub fn extract_error_line(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().map(str::trim).collect();

    if let Some(line) = lines.iter().find(|line| error_pattern().is_match(line)) {
        return line.to_string();
    }

    lines
        .iter()
        .rev()
        .find(|line| !line.is_empty())
        .map(|line| line.to_string())
        .unwrap_or_else(|| UNKNOWN_ERROR.to_string())
}

pub fn classify_report(report: &TranscodeReport) -> JobResult {
    if report.success() {
        Ok(())
    } else {
        Err(JobError::TranscodeFailure {
            code: report.code,
            message: extract_error_line(&report.stderr),
        })
    }
}

pub fn amv_arguments(input: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::with_capacity(22);
    args.push("-i".into());
    args.push(input.as_os_str().to_owned());
    for arg in [
        "-c:v",
        AMV_VIDEO_CODEC,
        "-c:a",
        AMV_AUDIO_CODEC,
        "-ar",
        AMV_SAMPLE_RATE,
        "-ac",
        AMV_AUDIO_CHANNELS,
        "-r",
        AMV_FRAME_RATE,
        "-block_size",
        AMV_BLOCK_SIZE,
        "-vf",
        AMV_VIDEO_FILTER,
        "-strict",
        "experimental",
        "-y",
    ] {
        args.push(arg.into());
    }
    args.push(output.as_os_str().to_owned());
    args
}
