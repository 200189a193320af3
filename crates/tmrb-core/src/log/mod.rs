mod message;
mod render;
mod tailer;

pub use message::{
    DEFAULT_PLUGIN_PATH_MARKER, ERROR_TAG, LogMessage, LogMessageParser, SCRIPT_ENGINE_SOURCE,
    Severity, WARNING_TAG,
};
pub use render::styled;
pub use tailer::{HitState, LOG_FILE_NAME, LogSlice, LogTailer, MonitorSession, SessionSummary};
