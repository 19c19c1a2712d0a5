pub mod backup_file;
pub mod config;
pub mod config_validator;
pub mod error;
pub mod event;
pub mod outcome;
