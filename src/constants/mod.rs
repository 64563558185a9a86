// App Constants
pub const APP_NAME: &str = "AMV Converter";
pub const WINDOW_TITLE: &str = "Video Converter - MP4 to AMV";
pub const WINDOW_SIZE: [f32; 2] = [560.0, 560.0];

// Transcoder
pub const FFMPEG_PATH_ENV: &str = "FFMPEG_PATH";
pub const DEFAULT_FFMPEG: &str = "ffmpeg";
pub const PROCESS_POLL_INTERVAL_MS: u64 = 100;
pub const STDERR_DRAIN_TIMEOUT_MS: u64 = 2000;
pub const UNKNOWN_ERROR: &str = "unknown error";

// Output naming
pub const TARGET_EXTENSION: &str = "amv";

// File picker filters (label, extensions)
pub const PICKER_FILTERS: &[(&str, &[&str])] = &[("MP4 files", &["mp4"]), ("All files", &["*"])];

// UI
pub const MAX_LOG_LINES: usize = 1000;
pub const REPAINT_INTERVAL_MS: u64 = 100;

// AMV encoding parameters, fixed for every job
pub const AMV_VIDEO_CODEC: &str = "amv";
pub const AMV_AUDIO_CODEC: &str = "adpcm_ima_amv";
pub const AMV_SAMPLE_RATE: &str = "22050";
pub const AMV_AUDIO_CHANNELS: &str = "1";
pub const AMV_FRAME_RATE: &str = "15";
pub const AMV_BLOCK_SIZE: &str = "1470";
pub const AMV_VIDEO_FILTER: &str = "scale=160:120,format=yuvj420p";
