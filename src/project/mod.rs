//! Project persistence: serde shapes plus a narrow key-value seam the host
//! environment implements.

pub mod store;

pub use store::{
    load_settings, load_timeline, save_settings, save_timeline, timeline_records, BoxRecord,
    EditorSettings, MemoryStore, MetadataStore, StoreError,
};
