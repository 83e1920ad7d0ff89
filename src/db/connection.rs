use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, bail, Context, Result};
use log::{error, info, warn};
use rusqlite::{Connection, OpenFlags};
use tokio::sync::oneshot;

use super::migrations::{check_readable, run_migrations};

/// How the reference store is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// The file must already exist. Nothing is written to it: no schema
    /// migration and no journal mode switch.
    ReadOnly,
    /// Creates the file and its directory when missing and brings the schema
    /// up to date.
    ReadWrite,
}

impl AccessMode {
    fn connect(self, path: &Path) -> Result<Connection> {
        match self {
            AccessMode::ReadOnly => {
                if !path.is_file() {
                    bail!("reference database {} does not exist", path.display());
                }
                let conn = Connection::open_with_flags(
                    path,
                    OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
                )
                .context("failed to open SQLite database read-only")?;
                check_readable(&conn)?;
                Ok(conn)
            }
            AccessMode::ReadWrite => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("failed to create database directory {}", parent.display())
                    })?;
                }
                let mut conn =
                    Connection::open(path).context("failed to open SQLite database")?;
                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    warn!("Failed to enable WAL mode: {err}");
                }
                run_migrations(&mut conn).context("failed to run database migrations")?;
                Ok(conn)
            }
        }
    }
}

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

/// `None` asks the worker to stop.
type Message = Option<Job>;

struct Worker {
    jobs: mpsc::Sender<Message>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    fn spawn(mut conn: Connection) -> Result<Self> {
        let (jobs, inbox) = mpsc::channel::<Message>();
        let thread = thread::Builder::new()
            .name("geogate-db".into())
            .spawn(move || {
                while let Ok(Some(job)) = inbox.recv() {
                    job(&mut conn);
                }
                info!("Database thread shutting down");
            })
            .context("failed to spawn database worker thread")?;

        Ok(Self {
            jobs,
            thread: Mutex::new(Some(thread)),
        })
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        let handle = self
            .thread
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(handle) = handle else {
            return;
        };

        if self.jobs.send(None).is_err() {
            error!("Database thread exited before shutdown was requested");
        }
        if let Err(err) = handle.join() {
            error!("Failed to join DB thread: {err:?}");
        }
    }
}

/// Handle to the reference store. All SQLite work runs on one worker thread
/// that owns the connection; clones share it.
#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
    path: Arc<PathBuf>,
}

impl Database {
    /// Opens `path` in the given mode. The connection is fully prepared
    /// before this returns, so open and migration errors surface here.
    pub fn new(path: PathBuf, mode: AccessMode) -> Result<Self> {
        let conn = mode.connect(&path)?;
        let worker = Worker::spawn(conn)?;

        info!(
            "Reference database opened {} at {}",
            match mode {
                AccessMode::ReadOnly => "read-only",
                AccessMode::ReadWrite => "read-write",
            },
            path.display()
        );

        Ok(Self {
            worker: Arc::new(worker),
            path: Arc::new(path),
        })
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |conn| {
            if reply_tx.send(task(conn)).is_err() {
                error!("DB caller dropped before receiving result");
            }
        });

        self.worker
            .jobs
            .send(Some(job))
            .map_err(|_| anyhow!("database thread is no longer running"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }
}
