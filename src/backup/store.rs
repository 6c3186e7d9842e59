use std::path::PathBuf;

use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode, header};
use sha2::Sha256;

use crate::prelude::*;

/// Remote location holding the latest copy of the store.
///
/// `replace` is a full overwrite, so repeating it is always safe.
#[async_trait::async_trait]
pub trait RemoteStore: Send + Sync {
  fn name(&self) -> &'static str;

  async fn fetch_latest(&self, key: &str) -> Result<Option<Vec<u8>>>;

  async fn replace(&self, key: &str, bytes: Vec<u8>) -> Result<()>;
}

/// Plain HTTP object storage: `GET`/`PUT <base>/<key>`.
pub struct HttpStore {
  client: Client,
  base: String,
  token: Option<String>,
  secret: Option<String>,
}

impl HttpStore {
  pub fn new(
    base: impl Into<String>,
    token: Option<String>,
    secret: Option<String>,
  ) -> Self {
    let base = base.into().trim_end_matches('/').to_string();
    Self { client: Client::new(), base, token, secret }
  }

  fn url(&self, key: &str) -> String {
    format!("{}/{}", self.base, key)
  }

  fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    match &self.token {
      Some(token) => req.bearer_auth(token),
      None => req,
    }
  }
}

/// Hex HMAC-SHA256 of the uploaded body, checked by the receiving side.
pub fn sign(secret: &str, body: &[u8]) -> Result<String> {
  let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
    .map_err(|e| Error::Backup(format!("invalid signing key: {e}")))?;
  mac.update(body);
  Ok(hex::encode(mac.finalize().into_bytes()))
}

#[async_trait::async_trait]
impl RemoteStore for HttpStore {
  fn name(&self) -> &'static str {
    "http"
  }

  async fn fetch_latest(&self, key: &str) -> Result<Option<Vec<u8>>> {
    let resp = self.authorize(self.client.get(self.url(key))).send().await?;

    if resp.status() == StatusCode::NOT_FOUND {
      return Ok(None);
    }

    let bytes = resp.error_for_status()?.bytes().await?;
    Ok(Some(bytes.to_vec()))
  }

  async fn replace(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
    let mut req = self
      .authorize(self.client.put(self.url(key)))
      .header(header::CONTENT_TYPE, "application/gzip");

    if let Some(secret) = &self.secret {
      req = req.header("X-Signature", sign(secret, &bytes)?);
    }

    req.body(bytes).send().await?.error_for_status()?;
    Ok(())
  }
}

/// Directory on a mounted drive. Writes go through a temporary file and a
/// rename so readers never see a partial copy.
pub struct DirStore {
  root: PathBuf,
}

impl DirStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }
}

#[async_trait::async_trait]
impl RemoteStore for DirStore {
  fn name(&self) -> &'static str {
    "dir"
  }

  async fn fetch_latest(&self, key: &str) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(self.root.join(key)).await {
      Ok(bytes) => Ok(Some(bytes)),
      Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(err) => Err(err.into()),
    }
  }

  async fn replace(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
    tokio::fs::create_dir_all(&self.root).await?;
    let target = self.root.join(key);
    let tmp = self.root.join(format!("{key}.partial"));
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, &target).await?;
    Ok(())
  }
}

#[cfg(test)]
pub use memory::MemoryStore;

#[cfg(test)]
mod memory {
  use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

  use super::*;

  #[derive(Default)]
  pub struct MemoryStore {
    objects: DashMap<String, Vec<u8>>,
    pub pushes: AtomicUsize,
    pub failing: AtomicBool,
  }

  impl MemoryStore {
    pub fn pushes(&self) -> usize {
      self.pushes.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
      self.failing.store(failing, Ordering::SeqCst);
    }
  }

  #[async_trait::async_trait]
  impl RemoteStore for MemoryStore {
    fn name(&self) -> &'static str {
      "memory"
    }

    async fn fetch_latest(&self, key: &str) -> Result<Option<Vec<u8>>> {
      Ok(self.objects.get(key).map(|v| v.clone()))
    }

    async fn replace(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
      if self.failing.load(Ordering::SeqCst) {
        return Err(Error::Backup("remote unavailable".into()));
      }
      self.objects.insert(key.to_string(), bytes);
      self.pushes.fetch_add(1, Ordering::SeqCst);
      Ok(())
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_dir_store_missing_key_is_absent() {
    let dir = tempfile::tempdir().unwrap();
    let store = DirStore::new(dir.path());

    assert_eq!(store.fetch_latest("ledger.db.gz").await.unwrap(), None);
  }

  #[tokio::test]
  async fn test_dir_store_replace_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let store = DirStore::new(dir.path().join("nested"));

    store.replace("ledger.db.gz", b"first".to_vec()).await.unwrap();
    store.replace("ledger.db.gz", b"second".to_vec()).await.unwrap();

    let latest = store.fetch_latest("ledger.db.gz").await.unwrap();
    assert_eq!(latest.as_deref(), Some(&b"second"[..]));
    assert!(!dir.path().join("nested/ledger.db.gz.partial").exists());
  }

  #[test]
  fn test_signature_is_stable_hex() {
    let a = sign("secret", b"payload").unwrap();
    let b = sign("secret", b"payload").unwrap();
    let c = sign("other", b"payload").unwrap();

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.len(), 64);
  }
}
