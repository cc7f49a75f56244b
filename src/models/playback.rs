//! Currently-playing payload and the snapshot derived from it

use std::fmt;

use serde::Deserialize;

/// `GET /v1/me/player/currently-playing` body. Only the fields we render.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentlyPlaying {
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub progress_ms: Option<i64>,
    /// Null for ads and some podcast states.
    #[serde(default)]
    pub item: Option<Item>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Item {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub duration_ms: i64,
    #[serde(default)]
    pub artists: Vec<Artist>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Artist {
    #[serde(default)]
    pub name: String,
}

/// What the renderer needs to know about the current track.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlaybackSnapshot {
    pub track_id: String,
    pub title: String,
    pub artists: Vec<String>,
    pub position_ms: i64,
    pub duration_ms: i64,
    pub is_playing: bool,
}

impl PlaybackSnapshot {
    /// Artist names joined the way they are displayed.
    pub fn artist_line(&self) -> String {
        self.artists.join(", ")
    }
}

impl CurrentlyPlaying {
    /// `None` when nothing renderable is playing.
    pub fn into_snapshot(self) -> Option<PlaybackSnapshot> {
        let item = self.item?;
        Some(PlaybackSnapshot {
            track_id: item.id.unwrap_or_default(),
            title: item.name,
            artists: item.artists.into_iter().map(|a| a.name).collect(),
            position_ms: self.progress_ms.unwrap_or(0),
            duration_ms: item.duration_ms,
            is_playing: self.is_playing,
        })
    }
}

/// Classification of one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// 204, an empty item, or a status we degrade silently.
    Idle,
    /// 401: the access token was rejected.
    Unauthorized,
    Active(PlaybackSnapshot),
}

/// Playback indicator shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    None,
    Playing,
    Paused,
}

impl PlaybackState {
    pub fn of(snapshot: Option<&PlaybackSnapshot>) -> Self {
        match snapshot {
            None => PlaybackState::None,
            Some(s) if s.is_playing => PlaybackState::Playing,
            Some(_) => PlaybackState::Paused,
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlaybackState::None => "none",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_track_payload() {
        let json = r#"{
            "timestamp": 1700000000000,
            "progress_ms": 30000,
            "is_playing": true,
            "currently_playing_type": "track",
            "item": {
                "id": "4uLU6hMCjMI75M1A2tKUQC",
                "name": "Never Gonna Give You Up",
                "duration_ms": 213573,
                "artists": [{"name": "Rick Astley", "id": "x"}, {"name": "Guest"}],
                "album": {"name": "Whenever You Need Somebody"}
            }
        }"#;
        let snap = serde_json::from_str::<CurrentlyPlaying>(json)
            .unwrap()
            .into_snapshot()
            .unwrap();
        assert_eq!(snap.track_id, "4uLU6hMCjMI75M1A2tKUQC");
        assert_eq!(snap.title, "Never Gonna Give You Up");
        assert_eq!(snap.artist_line(), "Rick Astley, Guest");
        assert_eq!(snap.position_ms, 30000);
        assert_eq!(snap.duration_ms, 213573);
        assert_eq!(PlaybackState::of(Some(&snap)), PlaybackState::Playing);
    }

    #[test]
    fn test_null_item_is_no_snapshot() {
        let json = r#"{"is_playing": true, "progress_ms": null, "item": null,
            "currently_playing_type": "ad"}"#;
        let cp: CurrentlyPlaying = serde_json::from_str(json).unwrap();
        assert!(cp.into_snapshot().is_none());
    }

    #[test]
    fn test_paused_state() {
        let snap = PlaybackSnapshot {
            is_playing: false,
            ..Default::default()
        };
        assert_eq!(PlaybackState::of(Some(&snap)).to_string(), "paused");
        assert_eq!(PlaybackState::of(None).to_string(), "none");
    }
}
