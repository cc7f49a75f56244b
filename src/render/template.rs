//! Template substitution for the playback line
//!
//! Recognised placeholders: `{prefix} {title} {artist} {sep} {bar}
//! {position} {duration} {elapsed} {remaining}`. Anything else in braces is
//! left as written.

use super::bar::{build_bar, BarOptions};
use super::text::{collapse_whitespace, maybe_ascii, ms_to_clock, shorten, trim_chatbox};
use crate::config::{AppConfig, ProgressStyle, TimeMode};
use crate::models::PlaybackSnapshot;

/// Resolved placeholder values. Empty means "toggled off".
#[derive(Debug, Clone, Default)]
pub struct Fields {
    pub prefix: String,
    pub title: String,
    pub artist: String,
    pub sep: String,
    pub bar: String,
    pub position: String,
    pub duration: String,
    pub elapsed: String,
    pub remaining: String,
}

impl Fields {
    fn get(&self, name: &str) -> Option<&str> {
        let value = match name {
            "prefix" => &self.prefix,
            "title" => &self.title,
            "artist" => &self.artist,
            "sep" => &self.sep,
            "bar" => &self.bar,
            "position" => &self.position,
            "duration" => &self.duration,
            "elapsed" => &self.elapsed,
            "remaining" => &self.remaining,
            _ => return None,
        };
        Some(value)
    }
}

/// Single left-to-right pass, so values containing `{title}` and the like
/// are never expanded a second time.
pub fn substitute(template: &str, fields: &Fields) -> String {
    let mut out = String::with_capacity(template.len() + 64);
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let resolved = after
            .find('}')
            .and_then(|end| fields.get(&after[..end]).map(|value| (end, value)));
        match resolved {
            Some((end, value)) => {
                out.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// One rendered playback line plus the optional separate time line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedLines {
    pub main: String,
    pub time_line: String,
}

/// Fold, collapse, cap.
fn finish(s: String, ascii_only: bool) -> String {
    trim_chatbox(&collapse_whitespace(&maybe_ascii(s, ascii_only)))
}

fn clamp_pair(cfg: &AppConfig, title: &str, artist: &str) -> (String, String) {
    if !cfg.clamp_long {
        return (title.to_string(), artist.to_string());
    }
    (
        shorten(title, cfg.title_limit()),
        shorten(artist, cfg.artist_limit()),
    )
}

/// Render `template` against `snapshot`. Without a snapshot only `{prefix}`
/// resolves.
pub fn render_lines(
    cfg: &AppConfig,
    template: &str,
    snapshot: Option<&PlaybackSnapshot>,
) -> RenderedLines {
    let prefix = if cfg.show_prefix {
        cfg.prefix_text.trim().to_string()
    } else {
        String::new()
    };

    let Some(snap) = snapshot else {
        let fields = Fields {
            prefix,
            ..Default::default()
        };
        return RenderedLines {
            main: finish(substitute(template, &fields), cfg.ascii_only),
            time_line: String::new(),
        };
    };

    let (title, artist) = clamp_pair(cfg, &snap.title, &snap.artist_line());
    let bar_opts = BarOptions {
        length: cfg.bar_len(),
        style: cfg.progress_style,
        ascii_only: cfg.ascii_only,
        inline_times: cfg.progress_style == ProgressStyle::Hud && cfg.show_time,
    };
    // Clocks drawn inside the bar are not repeated elsewhere
    let times_in_bar = cfg.show_bar && bar_opts.embeds_times();
    let bar = if cfg.show_bar {
        build_bar(snap.position_ms, snap.duration_ms, bar_opts)
    } else {
        String::new()
    };

    let position = ms_to_clock(snap.position_ms);
    let duration = ms_to_clock(snap.duration_ms);
    let remaining = format!("-{}", ms_to_clock((snap.duration_ms - snap.position_ms).max(0)));
    let on_main = cfg.show_time && !cfg.time_on_second_line && !times_in_bar;
    let shows_elapsed = matches!(cfg.time_mode, TimeMode::Elapsed | TimeMode::Both);
    let shows_remaining = matches!(cfg.time_mode, TimeMode::Remaining | TimeMode::Both);
    let when = |on: bool, value: &str| if on { value.to_string() } else { String::new() };

    let fields = Fields {
        prefix,
        title: when(cfg.show_title, &title),
        artist: when(cfg.show_artist, &artist),
        sep: when(cfg.show_title && cfg.show_artist, &cfg.sep_title_artist),
        bar,
        position: when(on_main, &position),
        duration: when(on_main, &duration),
        elapsed: when(on_main && shows_elapsed, &position),
        remaining: when(on_main && shows_remaining, &remaining),
    };
    let main = finish(substitute(template, &fields), cfg.ascii_only);

    let time_line = if cfg.show_time && cfg.time_on_second_line && !times_in_bar {
        let line = match cfg.time_mode {
            TimeMode::Elapsed => position,
            TimeMode::Remaining => remaining,
            TimeMode::Both => format!("{} / {}", position, duration),
        };
        finish(line, cfg.ascii_only)
    } else {
        String::new()
    };

    RenderedLines { main, time_line }
}
