//! Events the playback controller fans out to its subscribers.

use crate::playback::controller::PlaybackState;

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// Play head moved (seconds).
    TimeChanged(f64),
    /// Total timeline duration changed (seconds).
    DurationChanged(f64),
    StateChanged(PlaybackState),
}
