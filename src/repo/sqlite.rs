use crate::models::error::{BackupError, Result};
use crate::models::event::{EventLogEntry, EventRow, Severity};
use crate::service::event_log::EventLog;
use log::{debug, info};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OptionalExtension;

type DbPool = Pool<SqliteConnectionManager>;

/// Filters for reading events back out of the store.
#[derive(Debug, Default)]
pub struct EventFilter {
    pub source: Option<String>,
    pub severity: Option<Severity>,
    pub limit: Option<usize>,
}

/// Application event log persisted in a SQLite file.
pub struct SqliteEventLog {
    pool: DbPool,
}

impl SqliteEventLog {
    pub fn open(db_file: &str) -> Result<Self> {
        if db_file.is_empty() {
            return Err(BackupError::InvalidConfig(
                "Event log file path cannot be empty. Provide a valid path or use ':memory:'."
                    .to_string(),
            ));
        }

        info!("Opening event log: {}", db_file);

        let is_in_memory = db_file == ":memory:" || db_file.contains("mode=memory");
        let use_wal = !is_in_memory;

        let manager = SqliteConnectionManager::file(db_file).with_init(move |conn| {
            let mut pragmas = String::from(
                "PRAGMA busy_timeout = 5000;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA foreign_keys = ON;",
            );

            if use_wal {
                pragmas.push_str(" PRAGMA journal_mode = WAL;");
            }

            conn.execute_batch(&pragmas)
        });

        // One writer at a time is all the orchestrator ever needs.
        let pool = r2d2::Pool::builder()
            .max_size(2)
            .build(manager)
            .map_err(|cause| BackupError::EventLogPool {
                path: db_file.to_string(),
                cause,
            })?;

        let event_log = SqliteEventLog { pool };
        event_log.setup_schema()?;
        Ok(event_log)
    }

    /// Shared-cache in-memory store; `name` keeps tests isolated from each other.
    #[cfg(test)]
    pub fn in_memory(name: &str) -> Self {
        SqliteEventLog::open(&format!("file:{}?mode=memory&cache=shared", name)).unwrap()
    }

    fn get_connection(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|cause| BackupError::EventLogPool {
            path: "pool".to_string(),
            cause,
        })
    }

    fn setup_schema(&self) -> Result<()> {
        debug!("Initializing event log schema");
        let setup_queries = "BEGIN;
        PRAGMA ENCODING = 'UTF-8';

        CREATE TABLE IF NOT EXISTS Event_Sources(
            Source        TEXT    not null
                constraint Event_Sources_pk
                    primary key,
            Log_Name      TEXT    not null,
            Registered    integer not null);

        CREATE TABLE IF NOT EXISTS Events(
            ID            integer not null
                constraint Events_ID_pk
                    primary key autoincrement,
            Timestamp     integer not null,
            Log_Name      TEXT    not null,
            Source        TEXT    not null
                constraint Events_Event_Sources_fk
                    references Event_Sources (Source),
            Event_ID      integer not null,
            Level         TEXT    not null,
            Message       TEXT    not null,
            constraint Events_Level_Check
                check (Level IN ('INFORMATION', 'ERROR')));

        CREATE INDEX IF NOT EXISTS Events_Timestamp_index
                on Events (Timestamp DESC);

        CREATE INDEX IF NOT EXISTS Events_Source_Level_index
                on Events (Source, Level);

        COMMIT;";

        let conn = self.get_connection()?;
        conn.execute_batch(setup_queries)
            .map_err(|cause| BackupError::EventLogQuery {
                operation: "create tables".to_string(),
                cause,
            })?;
        Ok(())
    }

    /// Reads events newest first.
    pub fn query_events(&self, filter: &EventFilter) -> Result<Vec<EventRow>> {
        let conn = self.get_connection()?;

        let mut query = String::from(
            "SELECT ID, Timestamp, Log_Name, Source, Event_ID, Level, Message FROM Events WHERE 1=1",
        );
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(source) = &filter.source {
            query.push_str(" AND Source = ?");
            params.push(Box::new(source.clone()));
        }

        if let Some(severity) = filter.severity {
            query.push_str(" AND Level = ?");
            params.push(Box::new(severity.as_str()));
        }

        query.push_str(" ORDER BY Timestamp DESC, ID DESC");

        if let Some(limit) = filter.limit {
            query.push_str(" LIMIT ?");
            params.push(Box::new(limit as i64));
        }

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn
            .prepare(&query)
            .map_err(|cause| BackupError::EventLogQuery {
                operation: "query events".to_string(),
                cause,
            })?;

        let rows = stmt
            .query_map(param_refs.as_slice(), |row| {
                Ok(EventRow {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    log_name: row.get(2)?,
                    source: row.get(3)?,
                    event_id: row.get(4)?,
                    level: row.get(5)?,
                    message: row.get(6)?,
                })
            })
            .map_err(|cause| BackupError::EventLogQuery {
                operation: "query events".to_string(),
                cause,
            })?;

        rows.collect::<rusqlite::Result<Vec<EventRow>>>()
            .map_err(|cause| BackupError::EventLogQuery {
                operation: "collect event rows".to_string(),
                cause,
            })
    }
}

impl EventLog for SqliteEventLog {
    fn source_exists(&self, source: &str) -> Result<bool> {
        let conn = self.get_connection()?;
        conn.query_row(
            "SELECT 1 FROM Event_Sources WHERE Source = ?1",
            [source],
            |row| row.get::<_, i64>(0),
        )
        .optional()
        .map(|found| found.is_some())
        .map_err(|cause| BackupError::EventLogQuery {
            operation: "select event source".to_string(),
            cause,
        })
    }

    fn register_source(&self, source: &str, log_name: &str) -> Result<()> {
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO Event_Sources (Source, Log_Name, Registered) VALUES (?1, ?2, ?3)",
            (source, log_name, chrono::Utc::now().timestamp()),
        )
        .map_err(|cause| BackupError::EventLogQuery {
            operation: format!("register event source '{}'", source),
            cause,
        })?;
        Ok(())
    }

    fn write_entry(&self, entry: &EventLogEntry) -> Result<()> {
        let conn = self.get_connection()?;
        let timestamp = chrono::Utc::now().timestamp();

        // The log name comes from the source registration, and writing
        // under an unregistered source inserts nothing.
        let inserted = conn
            .execute(
                "INSERT INTO Events (Timestamp, Log_Name, Source, Event_ID, Level, Message)
                 SELECT ?1, Log_Name, Source, ?3, ?4, ?5
                 FROM Event_Sources
                 WHERE Source = ?2",
                (
                    timestamp,
                    &entry.source,
                    entry.event_id,
                    entry.severity.as_str(),
                    &entry.message,
                ),
            )
            .map_err(|cause| BackupError::EventLogInsert {
                event_id: entry.event_id,
                source_name: entry.source.clone(),
                cause,
            })?;

        if inserted == 0 {
            return Err(BackupError::EventLogInsert {
                event_id: entry.event_id,
                source_name: entry.source.clone(),
                cause: rusqlite::Error::QueryReturnedNoRows,
            });
        }

        debug!("Wrote event {} for {}", entry.event_id, entry.source);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::{EventKind, APPLICATION_LOG};

    fn entry(kind: EventKind, source: &str, message: &str) -> EventLogEntry {
        EventLogEntry::new(kind, source, message.to_string())
    }

    #[test]
    fn test_open_rejects_empty_path() {
        assert!(matches!(
            SqliteEventLog::open(""),
            Err(BackupError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_register_and_lookup_source() {
        let event_log = SqliteEventLog::in_memory("register_lookup");

        assert!(!event_log.source_exists("Postgres Backup").unwrap());
        event_log
            .register_source("Postgres Backup", APPLICATION_LOG)
            .unwrap();
        assert!(event_log.source_exists("Postgres Backup").unwrap());
    }

    #[test]
    fn test_duplicate_registration_is_an_error() {
        let event_log = SqliteEventLog::in_memory("duplicate_registration");

        event_log
            .register_source("Postgres Backup", APPLICATION_LOG)
            .unwrap();
        let result = event_log.register_source("Postgres Backup", APPLICATION_LOG);

        assert!(matches!(result, Err(BackupError::EventLogQuery { .. })));
    }

    #[test]
    fn test_write_requires_registered_source() {
        let event_log = SqliteEventLog::in_memory("unregistered_write");

        let result = event_log.write_entry(&entry(EventKind::BackupSucceeded, "Nobody", "hi"));

        assert!(matches!(result, Err(BackupError::EventLogInsert { .. })));
    }

    #[test]
    fn test_written_events_read_back_newest_first() {
        let event_log = SqliteEventLog::in_memory("read_back");
        event_log
            .register_source("Postgres Backup", APPLICATION_LOG)
            .unwrap();

        event_log
            .write_entry(&entry(EventKind::DirectoryCreated, "Postgres Backup", "dir"))
            .unwrap();
        event_log
            .write_entry(&entry(EventKind::BackupFailed, "Postgres Backup", "failed"))
            .unwrap();

        let rows = event_log.query_events(&EventFilter::default()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].event_id, 3);
        assert_eq!(rows[0].level, "ERROR");
        assert_eq!(rows[0].log_name, APPLICATION_LOG);
        assert_eq!(rows[1].event_id, 2);
        assert_eq!(rows[1].level, "INFORMATION");
    }

    #[test]
    fn test_query_filters_by_source_severity_and_limit() {
        let event_log = SqliteEventLog::in_memory("query_filters");
        event_log.register_source("A", APPLICATION_LOG).unwrap();
        event_log.register_source("B", APPLICATION_LOG).unwrap();

        event_log
            .write_entry(&entry(EventKind::BackupSucceeded, "A", "a ok"))
            .unwrap();
        event_log
            .write_entry(&entry(EventKind::BackupFailed, "A", "a failed"))
            .unwrap();
        event_log
            .write_entry(&entry(EventKind::BackupFailed, "B", "b failed"))
            .unwrap();

        let only_a = event_log
            .query_events(&EventFilter {
                source: Some("A".to_string()),
                ..EventFilter::default()
            })
            .unwrap();
        assert_eq!(only_a.len(), 2);

        let errors = event_log
            .query_events(&EventFilter {
                severity: Some(Severity::Error),
                ..EventFilter::default()
            })
            .unwrap();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|row| row.event_id == 3));

        let limited = event_log
            .query_events(&EventFilter {
                limit: Some(1),
                ..EventFilter::default()
            })
            .unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].message, "b failed");
    }
}
