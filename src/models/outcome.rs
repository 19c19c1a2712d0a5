use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpOutcome {
    /// The dump process was started and waited on. `exit_code` is whatever
    /// the process returned; it does not decide success.
    Completed {
        archive: PathBuf,
        exit_code: Option<i32>,
    },
    /// Starting or waiting on the process raised an error.
    Failed { detail: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PruneOutcome {
    Deleted { total: usize, deleted: usize },
    /// Fewer than two non-aged files would survive, so nothing was removed.
    Skipped { total: usize, aged: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseOutcome {
    pub database: String,
    pub directory_created: bool,
    pub dump: DumpOutcome,
    pub prune: PruneOutcome,
}
