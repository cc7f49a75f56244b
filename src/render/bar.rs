//! Progress bar drawing

use super::text::ms_to_clock;
use crate::config::ProgressStyle;

const ASCII_FILL: char = '#';
const ASCII_EMPTY: char = '-';
const BLOCK_FILL: char = '█';
const HUD_FILL: char = '▉';
const SHADE_EMPTY: char = '░';
const FRAME: char = '│';

#[derive(Debug, Clone, Copy)]
pub struct BarOptions {
    /// Cells between the brackets.
    pub length: usize,
    pub style: ProgressStyle,
    /// Forces the `#`/`-` glyphs whatever the style.
    pub ascii_only: bool,
    /// Embed `M:SS` clocks around a hud bar.
    pub inline_times: bool,
}

impl BarOptions {
    /// Whether this bar actually carries the clocks, so callers can leave
    /// them out of the rest of the line.
    pub fn embeds_times(&self) -> bool {
        self.style == ProgressStyle::Hud && self.inline_times && !self.ascii_only
    }
}

/// Filled cells for `position/duration`, rounded, within `0..=length`.
pub fn filled_cells(position_ms: i64, duration_ms: i64, length: usize) -> usize {
    if duration_ms <= 0 {
        return 0;
    }
    let fraction = (position_ms as f64 / duration_ms as f64).clamp(0.0, 1.0);
    ((length as f64 * fraction).round() as usize).min(length)
}

fn cells(fill: char, empty: char, filled: usize, length: usize) -> String {
    let mut out = String::with_capacity(length * fill.len_utf8());
    out.extend(std::iter::repeat(fill).take(filled));
    out.extend(std::iter::repeat(empty).take(length - filled));
    out
}

pub fn build_bar(position_ms: i64, duration_ms: i64, opts: BarOptions) -> String {
    let length = opts.length;

    if duration_ms <= 0 {
        let core = cells(ASCII_FILL, ASCII_EMPTY, 0, length);
        if opts.embeds_times() {
            return format!("0:00 {} 0:00", core);
        }
        return format!("[{}]", core);
    }

    let filled = filled_cells(position_ms, duration_ms, length);
    match opts.style {
        ProgressStyle::Hud if !opts.ascii_only => {
            let bar = cells(HUD_FILL, SHADE_EMPTY, filled, length);
            if opts.inline_times {
                format!("{} {} {}", ms_to_clock(position_ms), bar, ms_to_clock(duration_ms))
            } else {
                bar
            }
        }
        ProgressStyle::Unicode if !opts.ascii_only => {
            format!("{}{}{}", FRAME, cells(BLOCK_FILL, SHADE_EMPTY, filled, length), FRAME)
        }
        _ => format!("[{}]", cells(ASCII_FILL, ASCII_EMPTY, filled, length)),
    }
}
