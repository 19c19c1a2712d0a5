use serde::Serialize;
use std::fmt;

/// Name of the host log every backup source is registered under.
pub const APPLICATION_LOG: &str = "Application";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Information,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Information => "INFORMATION",
            Severity::Error => "ERROR",
        }
    }

    pub fn parse(value: &str) -> Option<Severity> {
        match value.to_lowercase().as_str() {
            "information" | "info" => Some(Severity::Information),
            "error" => Some(Severity::Error),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three outcomes the orchestrator reports for a database.
///
/// The numeric ids are part of the external logging contract and must not
/// change: tooling that watches the application log filters on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    BackupSucceeded,
    DirectoryCreated,
    BackupFailed,
}

impl EventKind {
    pub fn event_id(&self) -> u32 {
        match self {
            EventKind::BackupSucceeded => 1,
            EventKind::DirectoryCreated => 2,
            EventKind::BackupFailed => 3,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            EventKind::BackupSucceeded | EventKind::DirectoryCreated => Severity::Information,
            EventKind::BackupFailed => Severity::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLogEntry {
    pub event_id: u32,
    pub severity: Severity,
    pub source: String,
    pub message: String,
}

impl EventLogEntry {
    pub fn new(kind: EventKind, source: &str, message: String) -> Self {
        EventLogEntry {
            event_id: kind.event_id(),
            severity: kind.severity(),
            source: source.to_string(),
            message,
        }
    }
}

/// An entry as read back from the event store.
#[derive(Debug, Clone, Serialize)]
pub struct EventRow {
    pub id: i64,
    pub timestamp: i64,
    pub log_name: String,
    pub source: String,
    pub event_id: u32,
    pub level: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_ids_match_logging_contract() {
        assert_eq!(EventKind::BackupSucceeded.event_id(), 1);
        assert_eq!(EventKind::DirectoryCreated.event_id(), 2);
        assert_eq!(EventKind::BackupFailed.event_id(), 3);
    }

    #[test]
    fn test_only_failure_is_an_error() {
        assert_eq!(EventKind::BackupSucceeded.severity(), Severity::Information);
        assert_eq!(EventKind::DirectoryCreated.severity(), Severity::Information);
        assert_eq!(EventKind::BackupFailed.severity(), Severity::Error);
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::parse("Error"), Some(Severity::Error));
        assert_eq!(Severity::parse("info"), Some(Severity::Information));
        assert_eq!(Severity::parse("INFORMATION"), Some(Severity::Information));
        assert_eq!(Severity::parse("warn"), None);
    }

    #[test]
    fn test_entry_takes_id_and_severity_from_kind() {
        let entry = EventLogEntry::new(
            EventKind::BackupFailed,
            "Postgres Backup",
            "boom".to_string(),
        );
        assert_eq!(entry.event_id, 3);
        assert_eq!(entry.severity, Severity::Error);
        assert_eq!(entry.source, "Postgres Backup");
    }
}
