//! Preview playback: clock, frame queue, events and the controller that
//! owns them.

pub mod clock;
pub mod controller;
pub mod events;
pub mod queue;

pub use clock::PlaybackClock;
pub use controller::{PlaybackController, PlaybackState, RenderFrame};
pub use events::PlayerEvent;
pub use queue::FrameQueue;
