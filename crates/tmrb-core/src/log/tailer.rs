//! Incremental reader for the host's `Openplanet.log`.
//!
//! A monitoring session baselines at the current end of the file, then polls
//! for appended lines until no relevant output has shown up for a number of
//! consecutive checks. The file is opened fresh for every read; the host keeps
//! writing to it concurrently.

use std::fmt::Display;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use super::message::{LogMessage, LogMessageParser};
use super::render::{ERRORS_BANNER, error_count, styled};
use crate::Result;

/// Name of the log file inside the host's data folder
pub const LOG_FILE_NAME: &str = "Openplanet.log";

/// Progress of the settle heuristic within a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HitState {
    /// No relevant message seen yet.
    #[default]
    NeverHit,
    /// Relevant output was seen; counts empty polls since the last hit.
    Hit(u32),
}

/// Messages read from a byte range of the log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSlice {
    pub messages: Vec<LogMessage>,
    pub bytes_read: u64,
    pub end_offset: u64,
}

impl LogSlice {
    fn empty_at(offset: u64) -> Self {
        Self {
            end_offset: offset,
            ..Self::default()
        }
    }
}

/// Outcome of closing a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Every `ScriptEngine` message in the session window.
    pub messages: Vec<LogMessage>,
    /// The subset tagged as errors.
    pub errors: Vec<LogMessage>,
}

pub struct LogTailer {
    file_path: Option<PathBuf>,
    session_start: u64,
    last_checked: u64,
    hit_state: HitState,
    plugin_id: Option<String>,
    parser: LogMessageParser,
    out: Box<dyn Write + Send>,
}

impl Default for LogTailer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LogTailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogTailer")
            .field("file_path", &self.file_path)
            .field("session_start", &self.session_start)
            .field("last_checked", &self.last_checked)
            .field("hit_state", &self.hit_state)
            .field("plugin_id", &self.plugin_id)
            .finish_non_exhaustive()
    }
}

impl LogTailer {
    /// Tailer that renders to stdout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }

    #[must_use]
    pub fn with_output(out: impl Write + Send + 'static) -> Self {
        Self {
            file_path: None,
            session_start: 0,
            last_checked: 0,
            hit_state: HitState::NeverHit,
            plugin_id: None,
            parser: LogMessageParser::default(),
            out: Box::new(out),
        }
    }

    #[must_use]
    pub fn with_parser(mut self, parser: LogMessageParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        debug!("Tailing {}", path.display());
        self.file_path = Some(path);
    }

    #[must_use]
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Plugin whose `detectedPlugin` lines count as relevant output.
    pub fn set_plugin_id(&mut self, plugin_id: Option<&str>) {
        self.plugin_id = plugin_id.filter(|id| !id.is_empty()).map(str::to_string);
    }

    #[must_use]
    pub fn plugin_id(&self) -> Option<&str> {
        self.plugin_id.as_deref()
    }

    #[must_use]
    pub fn session_start(&self) -> u64 {
        self.session_start
    }

    #[must_use]
    pub fn last_checked(&self) -> u64 {
        self.last_checked
    }

    #[must_use]
    pub fn hit_state(&self) -> HitState {
        self.hit_state
    }

    /// Begin a session at the current end of the log.
    ///
    /// Existing content is treated as baseline and is not replayed.
    pub fn start_monitor(&mut self) {
        self.session_start = 0;
        self.last_checked = 0;
        self.hit_state = HitState::NeverHit;

        let Some(size) = self.file_size() else {
            return;
        };

        self.session_start = size;
        self.last_checked = size;
        debug!("Log baseline at {size} bytes");
    }

    /// Move both offsets back by `offset` bytes, stopping at the file start.
    pub fn seek_back(&mut self, offset: u64) {
        self.session_start = self.session_start.saturating_sub(offset);
        self.last_checked = self.last_checked.saturating_sub(offset);
    }

    /// Read and parse bytes `[start, end)`; `None` reads to end of file.
    ///
    /// A missing or unreadable file gives an empty slice.
    #[must_use]
    pub fn read_slice(&self, start: u64, end: Option<u64>) -> LogSlice {
        self.read_or_empty(start, end, false)
    }

    /// Like [`read_slice`](Self::read_slice) to end of file, but stops after
    /// the last newline so a line still being written is read again later.
    fn read_complete_lines(&self, start: u64) -> LogSlice {
        self.read_or_empty(start, None, true)
    }

    fn read_or_empty(&self, start: u64, end: Option<u64>, whole_lines: bool) -> LogSlice {
        match self.try_read_slice(start, end, whole_lines) {
            Ok(slice) => slice,
            Err(e) => {
                debug!("Error reading log slice at {start}: {e}");
                LogSlice::empty_at(start)
            }
        }
    }

    fn try_read_slice(
        &self,
        start: u64,
        end: Option<u64>,
        whole_lines: bool,
    ) -> Result<LogSlice> {
        let Some(path) = self.file_path.as_deref() else {
            return Ok(LogSlice::empty_at(start));
        };
        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(LogSlice::empty_at(start));
            }
            Err(e) => return Err(e.into()),
        };

        let size = file.metadata()?.len();
        if start >= size {
            // Truncated or rotated: pull the offset back to the real end.
            return Ok(LogSlice::empty_at(size));
        }
        let stop = end.map_or(size, |end| end.clamp(start, size));

        file.seek(SeekFrom::Start(start))?;
        let mut raw = Vec::new();
        file.take(stop - start).read_to_end(&mut raw)?;
        if whole_lines {
            let complete = raw.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
            raw.truncate(complete);
        }

        let bytes_read = raw.len() as u64;
        let messages: Vec<LogMessage> = String::from_utf8_lossy(&raw)
            .lines()
            .map(|line| self.parser.parse(line))
            .collect();
        debug!("{} new lines found", messages.len());

        Ok(LogSlice {
            messages,
            bytes_read,
            end_offset: start + bytes_read,
        })
    }

    /// Poll once for new output. Returns `true` once the log has settled.
    ///
    /// Settled means `limit` consecutive polls without relevant output after
    /// at least one relevant message was seen. Before the first hit this never
    /// returns `true`.
    pub fn check_if_done(&mut self, limit: u32) -> bool {
        let slice = self.read_complete_lines(self.last_checked);
        self.last_checked = slice.end_offset;
        self.session_start = self.session_start.min(self.last_checked);

        let relevant: Vec<&LogMessage> = slice
            .messages
            .iter()
            .filter(|msg| self.is_relevant(msg))
            .collect();

        if !relevant.is_empty() {
            for msg in relevant {
                self.emit(styled(msg));
            }
            self.hit_state = HitState::Hit(0);
            return false;
        }

        match self.hit_state {
            HitState::NeverHit => false,
            HitState::Hit(count) => {
                let count = count.saturating_add(1);
                self.hit_state = HitState::Hit(count);
                count >= limit
            }
        }
    }

    fn is_relevant(&self, msg: &LogMessage) -> bool {
        msg.is_script_engine() || self.plugin_id.as_deref() == Some(msg.detected_plugin.as_str())
    }

    /// Close the session: replay every `ScriptEngine` line since the session
    /// started, followed by an error summary.
    pub fn end_monitor(&mut self, print: bool) -> SessionSummary {
        let slice = self.read_slice(self.session_start, None);
        let messages: Vec<LogMessage> = slice
            .messages
            .into_iter()
            .filter(LogMessage::is_script_engine)
            .collect();
        let errors: Vec<LogMessage> = messages
            .iter()
            .filter(|msg| msg.is_error())
            .cloned()
            .collect();

        if print {
            for msg in &messages {
                self.emit(styled(msg));
            }
            if !errors.is_empty() {
                self.emit(ERRORS_BANNER);
                self.emit(error_count(errors.len()));
                for msg in &errors {
                    self.emit(styled(msg));
                }
            }
        }

        self.session_start = 0;
        SessionSummary { messages, errors }
    }

    /// Start a session that is closed (and printed) when the guard drops.
    pub fn session(&mut self) -> MonitorSession<'_> {
        self.start_monitor();
        MonitorSession { tailer: self }
    }

    /// Run a full session, polling every `interval` until settled.
    pub async fn watch_and_print(&mut self, limit: u32, interval: Duration) {
        self.watch_from(0, limit, interval).await;
    }

    /// Like [`watch_and_print`](Self::watch_and_print), but first rewinds
    /// `back` bytes so recent history is replayed.
    pub async fn watch_from(&mut self, back: u64, limit: u32, interval: Duration) {
        let mut session = self.session();
        session.seek_back(back);
        while !session.check_if_done(limit) {
            tokio::time::sleep(interval).await;
        }
    }

    fn file_size(&self) -> Option<u64> {
        let path = self.file_path.as_deref()?;
        std::fs::metadata(path)
            .ok()
            .filter(std::fs::Metadata::is_file)
            .map(|meta| meta.len())
    }

    fn emit(&mut self, line: impl Display) {
        if let Err(e) = writeln!(self.out, "{line}") {
            debug!("Error writing log output: {e}");
        }
    }
}

/// Scoped monitoring session; runs `end_monitor(true)` on drop.
///
/// Dropping covers early returns, panics and cancelled futures alike.
pub struct MonitorSession<'a> {
    tailer: &'a mut LogTailer,
}

impl Deref for MonitorSession<'_> {
    type Target = LogTailer;

    fn deref(&self) -> &Self::Target {
        self.tailer
    }
}

impl DerefMut for MonitorSession<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.tailer
    }
}

impl Drop for MonitorSession<'_> {
    fn drop(&mut self) {
        self.tailer.end_monitor(true);
    }
}
