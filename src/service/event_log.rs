use crate::models::error::Result;
use crate::models::event::{EventKind, EventLogEntry, Severity, APPLICATION_LOG};
use log::{error, info};

/// A host event log that entries are written to under a registered source.
pub trait EventLog {
    fn source_exists(&self, source: &str) -> Result<bool>;

    /// Registers `source` under `log_name`. Registering a source twice is
    /// an error, callers go through [`ensure_event_source`].
    fn register_source(&self, source: &str, log_name: &str) -> Result<()>;

    fn write_entry(&self, entry: &EventLogEntry) -> Result<()>;
}

/// Registers the source with the application log unless it already exists.
/// Returns true when a registration happened.
pub fn ensure_event_source(event_log: &dyn EventLog, source: &str) -> Result<bool> {
    if event_log.source_exists(source)? {
        info!("Event source '{}' already registered", source);
        return Ok(false);
    }

    event_log.register_source(source, APPLICATION_LOG)?;
    info!(
        "Registered event source '{}' with the {} log",
        source, APPLICATION_LOG
    );
    Ok(true)
}

/// Writes one event and mirrors it to the console log.
pub fn record_event(
    event_log: &dyn EventLog,
    kind: EventKind,
    source: &str,
    message: String,
) -> Result<()> {
    let entry = EventLogEntry::new(kind, source, message);
    match entry.severity {
        Severity::Information => info!("[event {}] {}", entry.event_id, entry.message),
        Severity::Error => error!("[event {}] {}", entry.event_id, entry.message),
    }
    event_log.write_entry(&entry)
}
