//! Observability sink.
//!
//! Hosts that want lifecycle visibility (devtools bridges, inspectors)
//! install a sink through [`crate::world::WorldOptions`]. The core only
//! announces itself; everything else the host derives from stats.

/// Narrow interface the core notifies about its own lifecycle.
pub trait ObservabilitySink: Send {
    /// Emitted once, during world construction, with the core version.
    fn world_created(&mut self, version: &str);
}

/// Sink that forwards lifecycle events to the diagnostic log.
#[derive(Debug, Default)]
pub struct LoggingSink;

impl ObservabilitySink for LoggingSink {
    fn world_created(&mut self, version: &str) {
        tracing::info!(version, "world created");
    }
}
