use chrono::{DateTime, Local};
use log::debug;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Everything one dump invocation needs.
#[derive(Debug, Clone)]
pub struct DumpRequest<'a> {
    pub database: &'a str,
    pub archive: &'a Path,
    pub host: &'a str,
    pub port: u16,
    pub user: &'a str,
}

pub trait DumpTool {
    /// Runs the dump to completion. `Err` means the process could not be
    /// started or waited on; otherwise the exit code is returned as-is.
    fn dump(&self, request: &DumpRequest) -> io::Result<Option<i32>>;
}

/// `pg_dump` at a fixed installation path.
pub struct PgDump {
    binary: PathBuf,
}

impl PgDump {
    pub fn new(binary: PathBuf) -> Self {
        PgDump { binary }
    }
}

impl DumpTool for PgDump {
    fn dump(&self, request: &DumpRequest) -> io::Result<Option<i32>> {
        let args = dump_args(request);
        debug!("Running {} {:?}", self.binary.display(), args);
        // stdio is inherited so the verbose output lands on the console
        let status = Command::new(&self.binary).args(args).status()?;
        Ok(status.code())
    }
}

/// `<database>-<YYYYMMDD-HHMM>.tar`
pub fn archive_file_name(database: &str, now: DateTime<Local>) -> String {
    format!("{}-{}.tar", database, now.format("%Y%m%d-%H%M"))
}

/// Output file, host, port, user, verbose, tar format, large objects,
/// then the database name.
pub fn dump_args(request: &DumpRequest) -> Vec<OsString> {
    vec![
        OsString::from("-f"),
        request.archive.as_os_str().to_owned(),
        OsString::from("-h"),
        OsString::from(request.host),
        OsString::from("-p"),
        OsString::from(request.port.to_string()),
        OsString::from("-U"),
        OsString::from(request.user),
        OsString::from("-v"),
        OsString::from("-F"),
        OsString::from("t"),
        OsString::from("-b"),
        OsString::from(request.database),
    ]
}
