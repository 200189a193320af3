use std::fmt::Display;

use crossterm::style::{StyledContent, Stylize};

use super::message::{LogMessage, Severity};

pub(crate) const ERRORS_BANNER: &str = "------------ ERRORS ------------";

/// Message text colored by severity: red for errors, yellow for warnings.
#[must_use]
pub fn styled(message: &LogMessage) -> StyledContent<&str> {
    let text = message.text.as_str();
    match message.severity() {
        Severity::Error => text.red(),
        Severity::Warning => text.yellow(),
        Severity::Info => text.stylize(),
    }
}

pub(crate) fn error_count(count: usize) -> impl Display {
    format!("{count} errors found").red()
}
