//! Configuration and data file locations
//!
//! The config record is a flat JSON object. Every key is optional on disk and
//! falls back to its default, so files written by older builds keep loading.
//! Numeric keys are stored as written and clamped by their accessors.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};

pub const DEFAULT_TEMPLATE: &str = "{prefix} {title}{sep}{artist} {bar} {position}/{duration}";
pub const DEFAULT_AFK_TAG: &str = "[AFK]";

/// Resolved locations of the two persisted files.
#[derive(Debug, Clone)]
pub struct DataPaths {
    dir: PathBuf,
}

impl DataPaths {
    /// Use `dir` when given, otherwise the platform config directory.
    pub fn resolve(dir: Option<PathBuf>) -> Result<Self> {
        let dir = match dir {
            Some(dir) => dir,
            None => ProjectDirs::from("com", "vrc-spotify", "vrc-spotify")
                .context("Could not determine config directory")?
                .config_dir()
                .to_path_buf(),
        };
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.dir.join("config.json")
    }

    pub fn token_file(&self) -> PathBuf {
        self.dir.join("tokens.json")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStyle {
    #[default]
    Ascii,
    Unicode,
    Hud,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeMode {
    Elapsed,
    Remaining,
    #[default]
    Both,
}

/// How a rotation message is combined with the playback line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationMode {
    Standalone,
    Prepend,
    Append,
    #[default]
    TwoLine,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationItem {
    #[serde(default)]
    pub text: String,
}

impl RotationItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Spotify app client ID (public client, no secret)
    pub client_id: String,
    /// When false, `client_id` is blanked on save
    pub save_client_id: bool,

    /// OSC target host
    pub ip: String,
    /// OSC target port
    pub port: i64,
    /// Poll interval in seconds
    pub update_interval: i64,

    pub bar_length: i64,
    pub show_bar: bool,
    #[serde(rename = "prefix")]
    pub show_prefix: bool,
    pub prefix_text: String,
    pub sep_title_artist: String,
    pub progress_style: ProgressStyle,
    pub show_title: bool,
    pub show_artist: bool,
    pub show_time: bool,
    pub time_mode: TimeMode,
    pub time_on_second_line: bool,
    /// Drop every non-ASCII character from outgoing text
    pub ascii_only: bool,
    /// Only send when the text or the track changed
    pub only_changes: bool,
    pub template: String,

    pub rotation_enabled: bool,
    /// Seconds between rotation messages
    pub rotation_interval: i64,
    pub rotation_mode: RotationMode,
    pub rotation_items: Vec<RotationItem>,

    pub show_clock_line: bool,
    pub clock_24h: bool,
    pub clock_prefix: String,

    /// Periodic jump so the remote session is not flagged idle
    pub anti_afk_enabled: bool,
    pub anti_afk_interval: i64,

    pub show_specs_line: bool,
    pub show_specs_cpu: bool,
    pub show_specs_ram: bool,
    pub show_specs_gpu: bool,
    pub ram_in_gb: bool,

    /// Shorten long titles/artists with an ellipsis
    pub clamp_long: bool,
    pub max_title_len: i64,
    pub max_artist_len: i64,

    /// Tag the first line when the machine has been idle
    pub afk_tag_enabled: bool,
    /// Idle seconds before the tag appears
    pub afk_tag_after: i64,
    pub afk_tag_text: String,

    /// Ask the remote to play the chatbox notification sound
    pub chat_sound: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            save_client_id: true,
            ip: "127.0.0.1".to_string(),
            port: 9000,
            update_interval: 3,
            bar_length: 20,
            show_bar: true,
            show_prefix: true,
            prefix_text: "Spotify:".to_string(),
            sep_title_artist: " – ".to_string(),
            progress_style: ProgressStyle::Ascii,
            show_title: true,
            show_artist: true,
            show_time: true,
            time_mode: TimeMode::Both,
            time_on_second_line: true,
            ascii_only: true,
            only_changes: true,
            template: DEFAULT_TEMPLATE.to_string(),
            rotation_enabled: true,
            rotation_interval: 6,
            rotation_mode: RotationMode::TwoLine,
            rotation_items: vec![
                RotationItem::new("vibing in VRC"),
                RotationItem::new("Spotify Status via OSC"),
            ],
            show_clock_line: false,
            clock_24h: true,
            clock_prefix: String::new(),
            anti_afk_enabled: false,
            anti_afk_interval: 240,
            show_specs_line: false,
            show_specs_cpu: true,
            show_specs_ram: true,
            show_specs_gpu: true,
            ram_in_gb: true,
            clamp_long: true,
            max_title_len: 28,
            max_artist_len: 28,
            afk_tag_enabled: false,
            afk_tag_after: 120,
            afk_tag_text: DEFAULT_AFK_TAG.to_string(),
            chat_sound: true,
        }
    }
}

impl AppConfig {
    /// Load from disk. A missing file yields defaults; so does an
    /// unparseable one, with a warning.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read config file")?;
        match serde_json::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!("Config file {} unreadable, using defaults: {}", path.display(), e);
                Ok(Self::default())
            }
        }
    }

    /// Save to disk, leaving the client id out when the user opted out.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }
        let content = serde_json::to_string_pretty(&self.persisted())
            .context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// The record as it should be written.
    pub fn persisted(&self) -> Self {
        let mut data = self.clone();
        if !data.save_client_id {
            data.client_id.clear();
        }
        data
    }

    /// Drop the file and return the defaults.
    pub fn reset(path: &Path) -> Result<Self> {
        if path.exists() {
            fs::remove_file(path).context("Failed to remove config file")?;
        }
        let config = Self::default();
        config.save(path)?;
        Ok(config)
    }

    pub fn osc_port(&self) -> u16 {
        self.port.clamp(1, u16::MAX as i64) as u16
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval.clamp(1, 120) as u64)
    }

    pub fn bar_len(&self) -> usize {
        self.bar_length.clamp(4, 60) as usize
    }

    pub fn rotation_period(&self) -> Duration {
        Duration::from_secs(self.rotation_interval.clamp(1, 3600) as u64)
    }

    pub fn anti_afk_period(&self) -> Duration {
        Duration::from_secs(self.anti_afk_interval.clamp(5, 3600) as u64)
    }

    pub fn title_limit(&self) -> usize {
        self.max_title_len.clamp(6, 80) as usize
    }

    pub fn artist_limit(&self) -> usize {
        self.max_artist_len.clamp(6, 80) as usize
    }

    pub fn afk_threshold_secs(&self) -> u64 {
        self.afk_tag_after.clamp(10, 36_000) as u64
    }

    pub fn afk_tag(&self) -> &str {
        match self.afk_tag_text.trim() {
            "" => DEFAULT_AFK_TAG,
            tag => tag,
        }
    }

    pub fn template(&self) -> &str {
        match self.template.trim() {
            "" => DEFAULT_TEMPLATE,
            tpl => tpl,
        }
    }
}

/// Quiet period after a file event before the config is re-read.
const RELOAD_DEBOUNCE: Duration = Duration::from_millis(300);

/// Watches the config file's directory and republishes the record on edits.
pub struct ConfigWatcher {
    path: PathBuf,
    events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    _watcher: RecommendedWatcher,
}

impl ConfigWatcher {
    /// Start watching. The directory is created when missing so the file can
    /// appear later.
    pub fn new(path: PathBuf) -> Result<Self> {
        let dir = path
            .parent()
            .context("Config file has no parent directory")?
            .to_path_buf();
        fs::create_dir_all(&dir).context("Failed to create config directory")?;

        let (tx, events) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        })
        .context("Failed to create config watcher")?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", dir.display()))?;

        Ok(Self {
            path,
            events,
            _watcher: watcher,
        })
    }

    fn touches_config(&self, event: &Event) -> bool {
        let wanted = self.path.file_name();
        matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        ) && event.paths.iter().any(|p| p.file_name() == wanted)
    }

    /// Reload into `tx` until every receiver is gone.
    pub async fn run(mut self, tx: watch::Sender<AppConfig>) {
        while let Some(res) = self.events.recv().await {
            match res {
                Ok(event) if self.touches_config(&event) => {}
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!("Config watcher error: {}", e);
                    continue;
                }
            }

            // Editors save in several steps; settle before reading.
            tokio::time::sleep(RELOAD_DEBOUNCE).await;
            while self.events.try_recv().is_ok() {}

            match AppConfig::load(&self.path) {
                Ok(config) => {
                    let replaced = tx.send_if_modified(|current| {
                        if *current == config {
                            return false;
                        }
                        *current = config;
                        true
                    });
                    if replaced {
                        tracing::info!("Config reloaded from {}", self.path.display());
                    }
                }
                Err(e) => tracing::warn!("Config reload failed: {:#}", e),
            }
            if tx.is_closed() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn config_in(dir: &TempDir) -> PathBuf {
        dir.path().join("config.json")
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let cfg: AppConfig =
            serde_json::from_str(r#"{"port": 9001, "prefix": false, "rotation_mode": "append"}"#)
                .unwrap();
        assert_eq!(cfg.osc_port(), 9001);
        assert!(!cfg.show_prefix);
        assert_eq!(cfg.rotation_mode, RotationMode::Append);
        assert_eq!(cfg.template, DEFAULT_TEMPLATE);
        assert_eq!(cfg.rotation_items.len(), 2);
    }

    #[test]
    fn test_keys_match_record_layout() {
        let value = serde_json::to_value(AppConfig::default()).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 40);
        for key in ["prefix", "sep_title_artist", "rotation_items", "afk_tag_after", "chat_sound"] {
            assert!(obj.contains_key(key), "missing {}", key);
        }
        assert_eq!(obj["progress_style"], "ascii");
        assert_eq!(obj["rotation_mode"], "twoline");
        assert_eq!(obj["time_mode"], "both");
    }

    #[test]
    fn test_save_blanks_client_id_when_opted_out() {
        let dir = TempDir::new().unwrap();
        let path = config_in(&dir);
        let mut cfg = AppConfig {
            client_id: "abc".into(),
            save_client_id: false,
            ..Default::default()
        };
        cfg.save(&path).unwrap();
        assert_eq!(AppConfig::load(&path).unwrap().client_id, "");

        cfg.save_client_id = true;
        cfg.save(&path).unwrap();
        assert_eq!(AppConfig::load(&path).unwrap().client_id, "abc");
    }

    #[test]
    fn test_unparseable_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let path = config_in(&dir);
        fs::write(&path, "[1, 2").unwrap();
        assert_eq!(AppConfig::load(&path).unwrap(), AppConfig::default());

        let reset = AppConfig::reset(&path).unwrap();
        assert_eq!(reset, AppConfig::default());
        assert!(path.exists());
    }

    #[test]
    fn test_out_of_range_numbers_keep_other_keys() {
        let dir = TempDir::new().unwrap();
        let path = config_in(&dir);
        fs::write(
            &path,
            r#"{"client_id":"my-client","port":70000,"prefix_text":"Now:","bar_length":-3,"update_interval":-10}"#,
        )
        .unwrap();

        let cfg = AppConfig::load(&path).unwrap();
        assert_eq!(cfg.client_id, "my-client");
        assert_eq!(cfg.prefix_text, "Now:");
        assert_eq!(cfg.osc_port(), 65535);
        assert_eq!(cfg.bar_len(), 4);
        assert_eq!(cfg.poll_interval(), Duration::from_secs(1));

        let low = AppConfig {
            port: -1,
            ..Default::default()
        };
        assert_eq!(low.osc_port(), 1);
    }

    #[test]
    fn test_clamped_accessors() {
        let cfg = AppConfig {
            update_interval: 0,
            bar_length: 500,
            max_title_len: 1,
            anti_afk_interval: 1,
            afk_tag_after: 0,
            afk_tag_text: "  ".into(),
            template: " ".into(),
            ..Default::default()
        };
        assert_eq!(cfg.poll_interval(), Duration::from_secs(1));
        assert_eq!(cfg.bar_len(), 60);
        assert_eq!(cfg.title_limit(), 6);
        assert_eq!(cfg.anti_afk_period(), Duration::from_secs(5));
        assert_eq!(cfg.afk_threshold_secs(), 10);
        assert_eq!(cfg.afk_tag(), "[AFK]");
        assert_eq!(cfg.template(), DEFAULT_TEMPLATE);
    }

    #[test]
    fn test_data_paths_override() {
        let paths = DataPaths::resolve(Some(PathBuf::from("/tmp/x"))).unwrap();
        assert_eq!(paths.dir(), Path::new("/tmp/x"));
        assert_eq!(paths.config_file(), PathBuf::from("/tmp/x/config.json"));
        assert_eq!(paths.token_file(), PathBuf::from("/tmp/x/tokens.json"));
    }

    #[tokio::test]
    async fn test_watcher_publishes_edits() {
        let dir = TempDir::new().unwrap();
        let path = config_in(&dir);
        AppConfig::default().save(&path).unwrap();

        let watcher = ConfigWatcher::new(path.clone()).unwrap();
        let (tx, mut rx) = watch::channel(AppConfig::default());
        let task = tokio::spawn(watcher.run(tx));

        let edited = AppConfig {
            prefix_text: "Now:".into(),
            port: 9100,
            ..Default::default()
        };
        edited.save(&path).unwrap();

        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .expect("no reload within 5s")
            .unwrap();
        assert_eq!(rx.borrow().prefix_text, "Now:");
        assert_eq!(rx.borrow().osc_port(), 9100);
        task.abort();
    }
}
