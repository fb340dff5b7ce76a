// Adapters - External system implementations

pub mod exec_ffmpeg;
pub mod fs_store;
pub mod probe_ffprobe;
pub mod toml_config;
pub mod tracing_feedback;

#[cfg(feature = "libav")]
pub mod exec_libav;
#[cfg(feature = "libav")]
pub mod probe_libav;

// Re-export adapters
pub use exec_ffmpeg::FFmpegAdapter;
pub use fs_store::FileDraftStore;
pub use probe_ffprobe::FFprobeAdapter;
pub use toml_config::{ConfigOverrides, TomlConfigAdapter};
pub use tracing_feedback::{RecordingFeedback, TracingFeedbackAdapter};

#[cfg(feature = "libav")]
pub use exec_libav::DecodeLibavAdapter;
#[cfg(feature = "libav")]
pub use probe_libav::ProbeLibavAdapter;
