//! Keeps a remote copy of the SQLite store no older than the last commit.
//!
//! Ledger services hold a [`Notifier`] and signal after every committed
//! write. A single [`Worker`] drains the queue, coalesces whatever piled up
//! into one snapshot and replaces the remote copy. Failures only degrade
//! durability: the local commit stays the source of truth until the next
//! successful push.

mod store;

use std::{
  io::{Read, Write},
  path::{Path, PathBuf},
};

use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use sea_orm::{DbBackend, Statement};
use sha2::{Digest, Sha256};
use tokio::{
  sync::{mpsc, oneshot},
  task::JoinHandle,
};
use uuid::Uuid;

#[cfg(test)]
pub use self::store::MemoryStore;
pub use self::store::{DirStore, HttpStore, RemoteStore};
use crate::prelude::*;

enum Signal {
  Mutated,
  Flush(oneshot::Sender<Result<Pushed, String>>),
  Shutdown(oneshot::Sender<()>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pushed {
  Uploaded { bytes: usize },
  Unchanged,
  Disabled,
}

/// Handle given to everything that writes to the store.
#[derive(Clone, Default)]
pub struct Notifier {
  tx: Option<mpsc::UnboundedSender<Signal>>,
}

impl Notifier {
  /// A notifier with no worker behind it, used when backups are off.
  pub fn disabled() -> Self {
    Self { tx: None }
  }

  /// Must be called only after the mutation is committed.
  pub fn mutated(&self) {
    if let Some(tx) = &self.tx
      && tx.send(Signal::Mutated).is_err()
    {
      warn!("backup worker is gone, durability degraded");
    }
  }

  /// Pushes everything signalled so far and waits for the outcome.
  pub async fn flush(&self) -> Result<Pushed> {
    let Some(tx) = &self.tx else {
      return Ok(Pushed::Disabled);
    };

    let (done, wait) = oneshot::channel();
    tx.send(Signal::Flush(done))
      .map_err(|_| Error::Backup("backup worker stopped".into()))?;

    wait
      .await
      .map_err(|_| Error::Backup("backup worker stopped".into()))?
      .map_err(Error::Backup)
  }

  /// Best-effort final push, then stops the worker.
  pub async fn shutdown(&self) {
    let Some(tx) = &self.tx else {
      return;
    };

    let (done, wait) = oneshot::channel();
    if tx.send(Signal::Shutdown(done)).is_ok() {
      let _ = wait.await;
    }
  }
}

pub struct Worker {
  db: DatabaseConnection,
  store: Arc<dyn RemoteStore>,
  key: String,
  timeout: Duration,
  last_digest: Option<Vec<u8>>,
}

impl Worker {
  pub fn new(
    db: DatabaseConnection,
    store: Arc<dyn RemoteStore>,
    key: impl Into<String>,
    timeout: Duration,
  ) -> Self {
    Self { db, store, key: key.into(), timeout, last_digest: None }
  }

  pub fn spawn(self) -> (Notifier, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(self.run(rx));
    (Notifier { tx: Some(tx) }, handle)
  }

  async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Signal>) {
    info!("backup worker started (store: {}, key: {})", self.store.name(), self.key);

    while let Some(signal) = rx.recv().await {
      let mut waiters = Vec::new();
      let mut stop = None;
      let mut pending = 0usize;

      let mut take = |signal: Signal| match signal {
        Signal::Mutated => pending += 1,
        Signal::Flush(done) => waiters.push(done),
        Signal::Shutdown(done) => stop = Some(done),
      };

      take(signal);
      while let Ok(signal) = rx.try_recv() {
        take(signal);
      }

      if pending > 1 {
        debug!("coalesced {pending} mutations into one push");
      }

      let outcome = self.push().await.map_err(|err| err.to_string());
      if let Err(err) = &outcome {
        warn!("backup push failed, durability degraded: {err}");
      }

      for done in waiters {
        let _ = done.send(outcome.clone());
      }

      if let Some(done) = stop {
        info!("backup worker stopped after final push");
        let _ = done.send(());
        return;
      }
    }

    info!("backup channel closed, worker stopping");
  }

  async fn push(&mut self) -> Result<Pushed> {
    let raw = snapshot(&self.db).await?;
    let digest = Sha256::digest(&raw).to_vec();

    if self.last_digest.as_ref() == Some(&digest) {
      trace!("snapshot unchanged, skipping push");
      return Ok(Pushed::Unchanged);
    }

    let packed = compress(&raw)?;
    let bytes = packed.len();

    tokio::time::timeout(self.timeout, self.store.replace(&self.key, packed))
      .await
      .map_err(|_| Error::Backup(format!("push timed out after {:?}", self.timeout)))??;

    debug!("pushed snapshot ({} bytes, sha256 {})", bytes, hex::encode(&digest[..8]));
    self.last_digest = Some(digest);
    Ok(Pushed::Uploaded { bytes })
  }
}

/// Consistent copy of committed state, taken through the same pool as the
/// writers so it is ordered after them.
pub async fn snapshot(db: &DatabaseConnection) -> Result<Vec<u8>> {
  let path = std::env::temp_dir().join(format!("ledger-{}.snapshot", Uuid::new_v4()));

  db.execute(Statement::from_sql_and_values(
    DbBackend::Sqlite,
    "VACUUM INTO ?",
    [path.to_string_lossy().into_owned().into()],
  ))
  .await?;

  let bytes = tokio::fs::read(&path).await;
  let _ = tokio::fs::remove_file(&path).await;
  Ok(bytes?)
}

pub fn compress(raw: &[u8]) -> Result<Vec<u8>> {
  let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
  encoder.write_all(raw)?;
  Ok(encoder.finish()?)
}

pub fn decompress(packed: &[u8]) -> Result<Vec<u8>> {
  let mut raw = Vec::new();
  GzDecoder::new(packed).read_to_end(&mut raw)?;
  Ok(raw)
}

#[derive(Debug, PartialEq, Eq)]
pub enum Restored {
  Installed { bytes: usize },
  Absent,
}

/// Installs the remote copy at `path`. Must run before the database is
/// opened. A missing remote copy is a normal first run.
pub async fn restore(
  store: &dyn RemoteStore,
  key: &str,
  path: &Path,
  timeout: Duration,
) -> Result<Restored> {
  let fetched = tokio::time::timeout(timeout, store.fetch_latest(key))
    .await
    .map_err(|_| Error::Backup(format!("fetch timed out after {timeout:?}")))??;

  let Some(packed) = fetched else {
    return Ok(Restored::Absent);
  };

  let raw = decompress(&packed)?;

  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    tokio::fs::create_dir_all(parent).await?;
  }

  // stale journal files would be replayed over the restored copy
  for suffix in ["-wal", "-shm"] {
    let mut side = path.as_os_str().to_owned();
    side.push(suffix);
    let _ = tokio::fs::remove_file(PathBuf::from(side)).await;
  }

  let mut tmp = path.as_os_str().to_owned();
  tmp.push(".restore");
  let tmp = PathBuf::from(tmp);

  tokio::fs::write(&tmp, &raw).await?;
  tokio::fs::rename(&tmp, path).await?;

  Ok(Restored::Installed { bytes: raw.len() })
}
