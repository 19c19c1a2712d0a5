pub mod backup;
pub mod dump;
pub mod event_log;
pub mod retention;
