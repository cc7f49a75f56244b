//! Idle detection and the AFK tag

use crate::config::AppConfig;
use crate::render::text::trim_chatbox;

/// Seconds since the last keyboard/mouse input, if the OS will say.
pub trait IdleSource: Send + Sync {
    fn idle_seconds(&self) -> Option<f64>;
}

/// The platform idle clock. Reports nothing where no API is wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemIdle;

impl IdleSource for SystemIdle {
    fn idle_seconds(&self) -> Option<f64> {
        os_idle_seconds()
    }
}

#[cfg(windows)]
fn os_idle_seconds() -> Option<f64> {
    use windows_sys::Win32::System::SystemInformation::GetTickCount;
    use windows_sys::Win32::UI::Input::KeyboardAndMouse::{GetLastInputInfo, LASTINPUTINFO};

    let mut info = LASTINPUTINFO {
        cbSize: std::mem::size_of::<LASTINPUTINFO>() as u32,
        dwTime: 0,
    };
    // SAFETY: `info` is a properly sized, writable LASTINPUTINFO.
    let ok = unsafe { GetLastInputInfo(&mut info) };
    if ok == 0 {
        return None;
    }
    let now = unsafe { GetTickCount() };
    // Tick counter wraps every ~49.7 days
    Some(now.wrapping_sub(info.dwTime) as f64 / 1000.0)
}

#[cfg(not(windows))]
fn os_idle_seconds() -> Option<f64> {
    None
}

/// The tag to append this cycle, if any.
pub fn tag_for(cfg: &AppConfig, idle: &dyn IdleSource) -> Option<String> {
    if !cfg.afk_tag_enabled {
        return None;
    }
    let idle_secs = idle.idle_seconds()?;
    if idle_secs >= cfg.afk_threshold_secs() as f64 {
        Some(cfg.afk_tag().to_string())
    } else {
        None
    }
}

/// `line` + space + `tag`, re-capped.
pub fn append_tag(line: &str, tag: &str) -> String {
    trim_chatbox(format!("{} {}", line, tag).trim())
}

/// Idle clock with a fixed reading, for tests.
#[cfg(test)]
pub struct FixedIdle(pub Option<f64>);

#[cfg(test)]
impl IdleSource for FixedIdle {
    fn idle_seconds(&self) -> Option<f64> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled() -> AppConfig {
        AppConfig {
            afk_tag_enabled: true,
            afk_tag_after: 120,
            ..Default::default()
        }
    }

    #[test]
    fn test_tag_after_threshold() {
        let cfg = enabled();
        assert_eq!(tag_for(&cfg, &FixedIdle(Some(119.9))), None);
        assert_eq!(tag_for(&cfg, &FixedIdle(Some(120.0))).as_deref(), Some("[AFK]"));
    }

    #[test]
    fn test_disabled_or_unavailable_means_no_tag() {
        assert_eq!(tag_for(&AppConfig::default(), &FixedIdle(Some(1e6))), None);
        assert_eq!(tag_for(&enabled(), &FixedIdle(None)), None);
    }

    #[test]
    fn test_custom_tag_text() {
        let cfg = AppConfig {
            afk_tag_text: " zzz ".into(),
            ..enabled()
        };
        assert_eq!(tag_for(&cfg, &FixedIdle(Some(500.0))).as_deref(), Some("zzz"));
    }

    #[test]
    fn test_append_tag_recaps() {
        assert_eq!(append_tag("Spotify: x", "[AFK]"), "Spotify: x [AFK]");
        assert_eq!(append_tag("", "[AFK]"), "[AFK]");
        let full = "a".repeat(144);
        let tagged = append_tag(&full, "[AFK]");
        assert_eq!(tagged.chars().count(), 144);
        assert!(tagged.ends_with('…'));
    }
}
