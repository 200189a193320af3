//! Structured view of a single `Openplanet.log` line.
//!
//! Lines look like `[source] [time] [subject] [plugin]  free text`, with
//! anywhere from zero to four bracketed fields before the two-space separator.

/// Source tag for compiler and runtime output of the scripting engine
pub const SCRIPT_ENGINE_SOURCE: &str = "ScriptEngine";

/// Path segment that precedes plugin source folders in absolute paths
pub const DEFAULT_PLUGIN_PATH_MARKER: &str = "/OpenplanetNext/Plugins/";

/// Substring marking an error line
pub const ERROR_TAG: &str = " ERR :";

/// Substring marking a warning line
pub const WARNING_TAG: &str = " WARN :";

const FIELD_COUNT: usize = 4;
const SEPARATOR: &str = "  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// One parsed log line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogMessage {
    pub source: String,
    pub time: String,
    pub subject: String,
    pub detected_plugin: String,
    pub text: String,
}

impl LogMessage {
    #[must_use]
    pub fn is_script_engine(&self) -> bool {
        self.source == SCRIPT_ENGINE_SOURCE
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.text.contains(ERROR_TAG)
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        if self.is_error() {
            Severity::Error
        } else if self.text.contains(WARNING_TAG) {
            Severity::Warning
        } else {
            Severity::Info
        }
    }
}

enum ScanState {
    ExpectBracket,
    NoMoreBrackets,
}

/// Splits log lines into [`LogMessage`]s.
#[derive(Debug, Clone)]
pub struct LogMessageParser {
    plugin_path_marker: String,
}

impl Default for LogMessageParser {
    fn default() -> Self {
        Self::new(DEFAULT_PLUGIN_PATH_MARKER)
    }
}

impl LogMessageParser {
    #[must_use]
    pub fn new(plugin_path_marker: impl Into<String>) -> Self {
        Self {
            plugin_path_marker: plugin_path_marker.into(),
        }
    }

    #[must_use]
    pub fn parse(&self, line: &str) -> LogMessage {
        let mut fields: [String; FIELD_COUNT] = Default::default();
        let mut extracted = 0;
        let mut cursor = 0;
        let mut state = ScanState::ExpectBracket;

        let text_start = loop {
            match state {
                ScanState::ExpectBracket => {
                    let Some((end, field)) = next_bracketed(line, cursor) else {
                        state = ScanState::NoMoreBrackets;
                        continue;
                    };
                    fields[extracted] = field.trim().to_string();
                    extracted += 1;
                    cursor = end;

                    if extracted == FIELD_COUNT || line[cursor..].starts_with(SEPARATOR) {
                        break skip_chars(line, cursor, SEPARATOR.len());
                    }
                }
                ScanState::NoMoreBrackets => break cursor,
            }
        };

        let [source, time, subject, detected_plugin] = fields;
        LogMessage {
            source,
            time,
            subject,
            detected_plugin,
            text: self.shorten_path(&line[text_start..]),
        }
    }

    /// Make absolute plugin source paths relative to the plugin's own folder.
    ///
    /// Only applies to text that starts with a drive letter (`C:...`).
    #[must_use]
    pub fn shorten_path(&self, text: &str) -> String {
        if text.chars().nth(1) != Some(':') {
            return text.to_string();
        }
        let Some((_, after_marker)) = text.split_once(self.plugin_path_marker.as_str()) else {
            return text.to_string();
        };
        match after_marker.split_once('/') {
            Some((_plugin_dir, relative)) => relative.to_string(),
            None => after_marker.to_string(),
        }
    }
}

/// Find the next `[...]` group at or after `from`.
///
/// Returns the offset just past the closing bracket and the group contents.
fn next_bracketed(line: &str, from: usize) -> Option<(usize, &str)> {
    let open = from + line[from..].find('[')?;
    let close = open + line[open..].find(']')?;
    Some((close + 1, &line[open + 1..close]))
}

/// Byte offset `count` characters past `from`, clamped to the end of `line`.
fn skip_chars(line: &str, from: usize, count: usize) -> usize {
    line[from..]
        .char_indices()
        .nth(count)
        .map_or(line.len(), |(offset, _)| from + offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_bracketed() {
        assert_eq!(next_bracketed("ab[cd]ef", 0), Some((6, "cd")));
        assert_eq!(next_bracketed("[a][b]", 3), Some((6, "b")));
        assert_eq!(next_bracketed("no brackets", 0), None);
        assert_eq!(next_bracketed("[unclosed", 0), None);
    }

    #[test]
    fn test_skip_chars_clamps() {
        assert_eq!(skip_chars("ab  cd", 2, 2), 4);
        assert_eq!(skip_chars("ab", 1, 2), 2);
        assert_eq!(skip_chars("aé", 0, 1), 1);
        assert_eq!(skip_chars("éé", 0, 1), 2);
    }

    #[test]
    fn test_severity() {
        let mut msg = LogMessage {
            text: "Main.as (3, 1) :  ERR : bad".to_string(),
            ..Default::default()
        };
        assert_eq!(msg.severity(), Severity::Error);

        msg.text = "Main.as (3, 1) : WARN : meh".to_string();
        assert_eq!(msg.severity(), Severity::Warning);

        msg.text = "Compiling".to_string();
        assert_eq!(msg.severity(), Severity::Info);
    }
}
