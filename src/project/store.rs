//! Persisted project state: the serde shapes and the storage seam.
//!
//! The pipeline owns the shapes; the storage mechanism stays behind
//! [`MetadataStore`] and sees only opaque blobs. Restoring a project is a
//! two-step affair: the host re-uploads each referenced resource, demuxes it
//! into a fresh box, then applies the matching [`BoxRecord`] on top.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::effects::EffectSettings;
use crate::core::range::TrimRange;
use crate::timeline::{Timeline, TimelineBox};

/// Store key for [`EditorSettings`].
pub const SETTINGS_KEY: &str = "editor.settings";

/// Store key for the timeline's box records.
pub const TIMELINE_KEY: &str = "timeline.boxes";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage backend: {0}")]
    Backend(String),
    #[error("project state json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Output shape settings, stored once per project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorSettings {
    /// Aspect ratio label, e.g. `"16:9"`.
    pub ratio: String,
    /// Vertical output resolution in pixels, e.g. `1080`.
    pub resolution: u32,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            ratio: "16:9".into(),
            resolution: 1080,
        }
    }
}

/// One timeline box as persisted: enough to rebuild the box once the
/// referenced upload is demuxed again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxRecord {
    pub resource_id: String,
    pub effects: EffectSettings,
    pub range: TrimRange,
}

impl BoxRecord {
    /// Restore this record onto a freshly demuxed box. The range is applied
    /// through the trim operations so the box's track ranges stay in sync,
    /// and a shorter re-upload simply clamps.
    pub fn apply_to(&self, tbox: &mut TimelineBox) {
        tbox.resource_id = Some(self.resource_id.clone());
        tbox.effects = self.effects;
        tbox.trim_start(self.range.start);
        tbox.trim_end(self.range.end);
    }
}

/// Storage seam for project state. Keys are stable names, values opaque
/// bytes; the store never interprets them.
pub trait MetadataStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError>;
    fn delete(&mut self, key: &str) -> Result<(), StoreError>;
}

/// In-memory [`MetadataStore`], for tests and hosts without persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetadataStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.entries.insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Write `settings` under [`SETTINGS_KEY`].
pub fn save_settings(
    store: &mut dyn MetadataStore,
    settings: &EditorSettings,
) -> Result<(), StoreError> {
    let blob = serde_json::to_vec(settings)?;
    store.put(SETTINGS_KEY, &blob)
}

/// Read settings back, defaulting when nothing is stored yet.
pub fn load_settings(store: &dyn MetadataStore) -> Result<EditorSettings, StoreError> {
    match store.get(SETTINGS_KEY)? {
        Some(blob) => Ok(serde_json::from_slice(&blob)?),
        None => Ok(EditorSettings::default()),
    }
}

/// Write one record per box that references an upload, in timeline order.
/// Boxes assembled directly from raw tracks carry no resource id and are
/// not persisted.
pub fn save_timeline(
    store: &mut dyn MetadataStore,
    timeline: &Timeline,
) -> Result<(), StoreError> {
    let records = timeline_records(timeline);
    let blob = serde_json::to_vec(&records)?;
    store.put(TIMELINE_KEY, &blob)
}

/// Read the box records back; empty when nothing is stored.
pub fn load_timeline(store: &dyn MetadataStore) -> Result<Vec<BoxRecord>, StoreError> {
    match store.get(TIMELINE_KEY)? {
        Some(blob) => Ok(serde_json::from_slice(&blob)?),
        None => Ok(Vec::new()),
    }
}

/// The records [`save_timeline`] would write.
pub fn timeline_records(timeline: &Timeline) -> Vec<BoxRecord> {
    timeline
        .boxes()
        .iter()
        .filter_map(|tbox| {
            Some(BoxRecord {
                resource_id: tbox.resource_id.clone()?,
                effects: tbox.effects,
                range: tbox.range,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::timeline_box::testutil::{av_box, video_box};

    #[test]
    fn test_settings_round_trip() {
        let mut store = MemoryStore::new();
        let settings = EditorSettings {
            ratio: "9:16".into(),
            resolution: 720,
        };
        save_settings(&mut store, &settings).unwrap();
        assert_eq!(load_settings(&store).unwrap(), settings);
    }

    #[test]
    fn test_missing_settings_fall_back_to_defaults() {
        let store = MemoryStore::new();
        let settings = load_settings(&store).unwrap();
        assert_eq!(settings.ratio, "16:9");
        assert_eq!(settings.resolution, 1080);
    }

    #[test]
    fn test_timeline_round_trip_keeps_order_and_state() {
        let mut timeline = Timeline::new();
        let mut first = av_box(100, 20_000, 10);
        first.resource_id = Some("upload-a".into());
        first.effects.opacity = 40.0;
        first.trim_start(0.5);
        let mut second = video_box(150, 33_333, 30);
        second.resource_id = Some("upload-b".into());
        second.effects.blur = 2.0;
        timeline.push(first);
        timeline.push(second);

        let mut store = MemoryStore::new();
        save_timeline(&mut store, &timeline).unwrap();
        let records = load_timeline(&store).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].resource_id, "upload-a");
        assert_eq!(records[0].effects.opacity, 40.0);
        assert_eq!(records[0].range.start, 0.5);
        assert_eq!(records[1].resource_id, "upload-b");
        assert_eq!(records[1].effects.blur, 2.0);
    }

    #[test]
    fn test_boxes_without_resource_id_are_skipped() {
        let mut timeline = Timeline::new();
        timeline.push(video_box(30, 33_333, 30)); // test-built, no upload
        let mut named = video_box(30, 33_333, 30);
        named.resource_id = Some("upload-c".into());
        timeline.push(named);

        let records = timeline_records(&timeline);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].resource_id, "upload-c");
    }

    #[test]
    fn test_record_applies_to_rebuilt_box() {
        let mut original = av_box(100, 20_000, 10);
        original.resource_id = Some("upload-d".into());
        original.effects.saturation = -20.0;
        original.trim_start(0.4);
        original.trim_end(1.6);
        let record = timeline_records(&{
            let mut t = Timeline::new();
            t.push(original);
            t
        })
        .remove(0);

        // the host re-demuxed the upload; state comes back from the record
        let mut rebuilt = av_box(100, 20_000, 10);
        record.apply_to(&mut rebuilt);
        assert_eq!(rebuilt.resource_id.as_deref(), Some("upload-d"));
        assert_eq!(rebuilt.effects.saturation, -20.0);
        assert_eq!(rebuilt.range.start, 0.4);
        assert_eq!(rebuilt.range.end, 1.6);
        // track ranges follow the box range, same as interactive trimming
        assert_eq!(rebuilt.video_tracks()[0].range.start, 0.4);
    }

    #[test]
    fn test_delete_clears_an_entry() {
        let mut store = MemoryStore::new();
        save_settings(&mut store, &EditorSettings::default()).unwrap();
        store.delete(SETTINGS_KEY).unwrap();
        assert!(store.get(SETTINGS_KEY).unwrap().is_none());
    }

    #[test]
    fn test_stored_blob_is_plain_json() {
        let mut store = MemoryStore::new();
        save_settings(&mut store, &EditorSettings::default()).unwrap();
        let blob = store.get(SETTINGS_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&blob).unwrap();
        assert_eq!(value["ratio"], "16:9");
        assert_eq!(value["resolution"], 1080);
    }
}
