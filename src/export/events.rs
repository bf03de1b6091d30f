//! Events emitted while an export runs.

/// Notification fanned out through [`crate::export::Exporter::subscribe`].
#[derive(Debug, Clone, PartialEq)]
pub enum ExportEvent {
    /// Another sample was written. `total` is fixed for the whole run.
    Progress { encoded: usize, total: usize },
    /// The container is finished and ready to download.
    Completed,
    /// The run was aborted, by an error or an explicit reset.
    Cancelled,
}
