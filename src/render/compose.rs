//! Assembling the final multi-line chatbox message

use chrono::NaiveTime;

use super::text::{maybe_ascii, trim_chatbox};
use crate::afk::append_tag;
use crate::config::{AppConfig, RotationMode};

/// Everything that may go below (or be merged into) the playback line.
#[derive(Debug, Clone, Default)]
pub struct Extras<'a> {
    /// Active rotation text; empty when rotation has not fired.
    pub rotation: &'a str,
    pub time_line: &'a str,
    pub specs_line: &'a str,
    pub clock_line: &'a str,
    pub afk_tag: Option<&'a str>,
}

/// Merge the rotation text with the playback line.
///
/// Each resulting line is capped on its own; a `twoline` pair is never
/// checked against a combined budget.
pub fn combine_rotation(mode: RotationMode, rotation: &str, primary: &str) -> Vec<String> {
    match mode {
        RotationMode::Standalone => vec![rotation.to_string()],
        RotationMode::Prepend => vec![trim_chatbox(format!("{} {}", rotation, primary).trim())],
        RotationMode::Append => vec![trim_chatbox(format!("{} {}", primary, rotation).trim())],
        RotationMode::TwoLine => vec![rotation.to_string(), primary.to_string()],
    }
}

/// Build the message exactly as it will be sent.
pub fn compose_message(cfg: &AppConfig, primary: &str, extras: &Extras<'_>) -> String {
    let mut lines = if cfg.rotation_enabled && !extras.rotation.is_empty() {
        combine_rotation(cfg.rotation_mode, extras.rotation, primary)
    } else {
        vec![primary.to_string()]
    };

    if let (Some(tag), Some(first)) = (extras.afk_tag, lines.first_mut()) {
        *first = append_tag(first, tag);
    }

    if cfg.time_on_second_line && !extras.time_line.is_empty() {
        lines.push(extras.time_line.to_string());
    }
    for extra in [extras.specs_line, extras.clock_line] {
        if !extra.is_empty() {
            lines.push(extra.to_string());
        }
    }

    lines
        .into_iter()
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Local wall-clock line, or empty when disabled.
pub fn clock_line(cfg: &AppConfig, now: NaiveTime) -> String {
    if !cfg.show_clock_line {
        return String::new();
    }
    let fmt = if cfg.clock_24h { "%H:%M:%S" } else { "%I:%M:%S %p" };
    let time = now.format(fmt).to_string();
    let line = match cfg.clock_prefix.trim() {
        "" => time,
        prefix => format!("{} {}", prefix, time),
    };
    trim_chatbox(&maybe_ascii(line, cfg.ascii_only))
}
