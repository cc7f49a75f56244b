//! API client module for the Spotify Web API

pub mod playback;

pub use playback::PlaybackClient;
