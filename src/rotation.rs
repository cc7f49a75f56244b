//! Timed rotation through the user's custom messages

use std::time::Instant;

use crate::config::AppConfig;
use crate::models::PlaybackSnapshot;
use crate::render::render_lines;

/// Cursor over `rotation_items` plus the text currently on display.
#[derive(Debug, Clone)]
pub struct RotationScheduler {
    cursor: usize,
    next_due: Instant,
    current: String,
}

impl RotationScheduler {
    /// The first item becomes due immediately.
    pub fn new(now: Instant) -> Self {
        Self {
            cursor: 0,
            next_due: now,
            current: String::new(),
        }
    }

    /// Advance when due. Returns the freshly rendered text on the cycles
    /// where rotation fires.
    ///
    /// Item texts are templates; they render against the same playback
    /// state as the main line.
    pub fn tick(
        &mut self,
        cfg: &AppConfig,
        now: Instant,
        snapshot: Option<&PlaybackSnapshot>,
    ) -> Option<&str> {
        if cfg.rotation_items.is_empty() {
            self.current.clear();
            return None;
        }
        if !cfg.rotation_enabled || now < self.next_due {
            return None;
        }
        self.next_due = now + cfg.rotation_period();

        let item = &cfg.rotation_items[self.cursor % cfg.rotation_items.len()];
        self.cursor = self.cursor.wrapping_add(1);

        let text = item.text.trim();
        self.current = if text.is_empty() {
            String::new()
        } else {
            render_lines(cfg, text, snapshot).main
        };
        tracing::debug!("Rotation advanced to {:?}", self.current);
        Some(&self.current)
    }

    /// Text to merge into this cycle's message, empty when none.
    pub fn active_text(&self, cfg: &AppConfig) -> &str {
        if cfg.rotation_enabled && !cfg.rotation_items.is_empty() {
            &self.current
        } else {
            ""
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::{RotationItem, RotationMode};

    fn cfg(items: &[&str]) -> AppConfig {
        AppConfig {
            rotation_items: items.iter().map(|t| RotationItem::new(*t)).collect(),
            rotation_interval: 5,
            ..Default::default()
        }
    }

    #[test]
    fn test_cycles_items_on_schedule() {
        let cfg = cfg(&["one", "two"]);
        let t0 = Instant::now();
        let mut rot = RotationScheduler::new(t0);

        assert_eq!(rot.tick(&cfg, t0, None), Some("one"));
        assert_eq!(rot.tick(&cfg, t0 + Duration::from_secs(4), None), None);
        assert_eq!(rot.active_text(&cfg), "one");
        assert_eq!(rot.tick(&cfg, t0 + Duration::from_secs(5), None), Some("two"));
        assert_eq!(rot.tick(&cfg, t0 + Duration::from_secs(10), None), Some("one"));
    }

    #[test]
    fn test_empty_list_never_fires() {
        let cfg = AppConfig {
            rotation_mode: RotationMode::TwoLine,
            ..cfg(&[])
        };
        let t0 = Instant::now();
        let mut rot = RotationScheduler::new(t0);
        for s in 0..20 {
            assert_eq!(rot.tick(&cfg, t0 + Duration::from_secs(s), None), None);
        }
        assert_eq!(rot.active_text(&cfg), "");
    }

    #[test]
    fn test_disabled_hides_text() {
        let mut cfg = cfg(&["one"]);
        let t0 = Instant::now();
        let mut rot = RotationScheduler::new(t0);
        rot.tick(&cfg, t0, None);
        cfg.rotation_enabled = false;
        assert_eq!(rot.tick(&cfg, t0 + Duration::from_secs(60), None), None);
        assert_eq!(rot.active_text(&cfg), "");
    }

    #[test]
    fn test_emptied_list_drops_stale_text() {
        let mut cfg = cfg(&["one"]);
        let t0 = Instant::now();
        let mut rot = RotationScheduler::new(t0);
        assert_eq!(rot.tick(&cfg, t0, None), Some("one"));

        cfg.rotation_items.clear();
        assert_eq!(rot.active_text(&cfg), "");
        assert_eq!(rot.tick(&cfg, t0 + Duration::from_secs(1), None), None);

        // Refilling must not resurrect the old text before the next item fires
        cfg.rotation_items.push(RotationItem::new("two"));
        assert_eq!(rot.active_text(&cfg), "");
    }

    #[test]
    fn test_items_render_as_templates() {
        let cfg = cfg(&["  ", "{prefix} hi  {title}"]);
        let t0 = Instant::now();
        let mut rot = RotationScheduler::new(t0);
        assert_eq!(rot.tick(&cfg, t0, None), Some(""));
        assert_eq!(rot.tick(&cfg, t0 + Duration::from_secs(5), None), Some("Spotify: hi"));
        assert_eq!(rot.tick(&cfg, t0 + Duration::from_secs(10), None), Some(""));
    }
}
