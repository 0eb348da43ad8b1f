//! Append-only audit files for reproducing a search.

use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{SearchError, SearchResult};

/// Session settings, one JSON record per session start.
pub const CONFIG_FILE: &str = "args.txt";
/// Reconstructable command line, one line per session start.
pub const INVOCATION_FILE: &str = "invoke.txt";
/// Sampled configurations, one JSON record per trial.
pub const TRIALS_FILE: &str = "trials.txt";

/// Handles to the audit files of one output directory.
///
/// Files are opened in append mode for every write and synced before the
/// call returns, so several sessions can share a directory without
/// clobbering each other's history.
#[derive(Debug, Clone)]
pub struct AuditLog {
    dir: PathBuf,
}

impl AuditLog {
    /// Create the output directory if needed.
    pub fn open<P: AsRef<Path>>(dir: P) -> SearchResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| SearchError::AuditWrite {
            path: dir.clone(),
            source,
        })?;

        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn invocation_path(&self) -> PathBuf {
        self.dir.join(INVOCATION_FILE)
    }

    pub fn trials_path(&self) -> PathBuf {
        self.dir.join(TRIALS_FILE)
    }

    pub fn record_session<T: Serialize>(&self, record: &T) -> SearchResult<()> {
        let line = serde_json::to_string(record)?;
        append_line(&self.config_path(), &line)
    }

    pub fn record_invocation(&self, command_line: &str) -> SearchResult<()> {
        append_line(&self.invocation_path(), command_line)
    }

    pub fn record_trial<T: Serialize>(&self, record: &T) -> SearchResult<()> {
        let line = serde_json::to_string(record)?;
        append_line(&self.trials_path(), &line)
    }
}

/// Join arguments into a single shell command line.
///
/// Arguments made only of shell-safe characters are kept as they are;
/// anything else is single-quoted so pasting the line back into a shell
/// reproduces the exact argument list.
pub fn command_line<I, S>(args: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter()
        .map(|arg| shell_quote(arg.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_=./,:@%+".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

fn append_line(path: &Path, line: &str) -> SearchResult<()> {
    let write = || -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()
    };

    write().map_err(|source| SearchError::AuditWrite {
        path: path.to_path_buf(),
        source,
    })?;

    debug!("Appended {} bytes to {}", line.len() + 1, path.display());
    Ok(())
}
