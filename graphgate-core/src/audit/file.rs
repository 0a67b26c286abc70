use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs2::FileExt;

use super::{AuditError, AuditEvent, AuditSink, PairingIndex};

#[derive(Default)]
struct State {
    events: Vec<AuditEvent>,
    index: PairingIndex,
}

/// Audit sink backed by a JSON-lines file.
///
/// Each event is one line appended to the file, which is created (with its
/// parent directories) on the first record. Every call takes an OS lock on a
/// `<file>.lock` sidecar and re-reads the log, so any number of sinks and
/// processes sharing one path claim each correlation ID once.
pub struct FileAuditSink {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileAuditSink {
    /// Create a sink at `path`. The file does not need to exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_name = path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| OsString::from("audit"));
        lock_name.push(".lock");
        let lock_path = path.with_file_name(lock_name);
        Self { path, lock_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent(&self) -> Result<(), AuditError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(AuditError::storage)?;
            }
        }
        Ok(())
    }

    /// Open the sidecar and hold the lock until the returned file is dropped.
    fn lock(&self, exclusive: bool) -> Result<File, AuditError> {
        self.ensure_parent()?;
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(AuditError::storage)?;
        let locked = if exclusive {
            file.lock_exclusive()
        } else {
            file.lock_shared()
        };
        locked.map_err(|e| {
            AuditError::Storage(format!("failed to lock {}: {e}", self.lock_path.display()))
        })?;
        Ok(file)
    }

    /// Read the log and replay it through the pairing rules. A log that
    /// already breaks them is reported as corrupt.
    fn load(&self) -> Result<State, AuditError> {
        let mut state = State::default();
        if !self.path.exists() {
            return Ok(state);
        }

        let contents = std::fs::read_to_string(&self.path).map_err(AuditError::storage)?;
        for (n, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let event: AuditEvent = serde_json::from_str(line).map_err(|e| {
                AuditError::Storage(format!("{}:{}: {e}", self.path.display(), n + 1))
            })?;
            state.index.check(&event).map_err(|violation| {
                AuditError::Storage(format!(
                    "{}:{}: {violation}",
                    self.path.display(),
                    n + 1
                ))
            })?;
            state.index.apply(&event);
            state.events.push(event);
        }
        Ok(state)
    }

    fn append(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let mut line = serde_json::to_string(event).map_err(AuditError::storage)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(AuditError::storage)?;
        file.write_all(line.as_bytes())
            .and_then(|_| file.sync_data())
            .map_err(AuditError::storage)
    }
}

#[async_trait]
impl AuditSink for FileAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        let _lock = self.lock(true)?;
        let state = self.load()?;
        if let Err(violation) = state.index.check(&event) {
            log::warn!("audit event rejected: {violation}");
            return Err(violation.into());
        }
        self.append(&event)
    }

    async fn events(&self) -> Result<Vec<AuditEvent>, AuditError> {
        let _lock = self.lock(false)?;
        Ok(self.load()?.events)
    }
}
