//! Data models for Spotify API responses

pub mod playback;

pub use playback::{CurrentlyPlaying, PlaybackSnapshot, PlaybackState, PollOutcome};
