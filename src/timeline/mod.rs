#[allow(clippy::module_inception)]
pub mod timeline;
pub mod timeline_box;

pub use timeline::Timeline;
pub use timeline_box::{BoxId, TimelineBox};
