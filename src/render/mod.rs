//! Frame presentation and audio scheduling.

pub mod audio;
#[cfg(feature = "cpal")]
pub mod cpal;
pub mod renderer;

pub use audio::{AudioError, AudioRenderer, AudioSink};
#[cfg(feature = "cpal")]
pub use self::cpal::CpalSink;
pub use renderer::{fit_viewport, FrameRenderer, Viewport};
