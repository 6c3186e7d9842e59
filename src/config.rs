use std::{env, path::PathBuf, sync::Arc};

use anyhow::{Context, bail};

use crate::{
  backup::{DirStore, HttpStore, RemoteStore},
  prelude::*,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupTarget {
  Http { url: String, token: Option<String>, secret: Option<String> },
  Dir(PathBuf),
}

impl BackupTarget {
  pub fn store(&self) -> Arc<dyn RemoteStore> {
    match self {
      BackupTarget::Http { url, token, secret } => {
        Arc::new(HttpStore::new(url.clone(), token.clone(), secret.clone()))
      }
      BackupTarget::Dir(root) => Arc::new(DirStore::new(root.clone())),
    }
  }
}

#[derive(Debug, Clone)]
pub struct Config {
  pub token: String,
  pub admins: HashSet<i64>,
  pub database_path: PathBuf,
  pub order_recipient: Option<i64>,
  pub backup: Option<BackupTarget>,
  pub backup_key: String,
  pub backup_timeout: Duration,
  pub port: u16,
}

impl Config {
  pub fn from_env() -> anyhow::Result<Self> {
    Self::from_lookup(|name| env::var(name).ok())
  }

  fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
    let var = |name: &str| var(name).filter(|v| !v.trim().is_empty());

    let token = var("TELOXIDE_TOKEN").context("TELOXIDE_TOKEN not set")?;

    let admin_list = var("ADMIN_IDS").unwrap_or_default();
    let admin_ids = parse_ids(&admin_list).context("Invalid ADMIN_IDS")?;
    if admin_ids.is_empty() {
      warn!("ADMIN_IDS is empty, admin commands are unavailable");
    }

    let order_recipient = match var("ORDER_RECIPIENT") {
      Some(id) => Some(id.trim().parse().context("Invalid ORDER_RECIPIENT")?),
      None => admin_ids.first().copied(),
    };

    let database_path =
      PathBuf::from(var("DATABASE_PATH").unwrap_or_else(|| "ledger.db".into()));

    let backup_key = match var("BACKUP_KEY") {
      Some(key) => key,
      None => database_path
        .file_name()
        .map(|name| format!("{}.gz", name.to_string_lossy()))
        .context("DATABASE_PATH has no file name")?,
    };

    let backup = match (var("BACKUP_URL"), var("BACKUP_DIR")) {
      (Some(_), Some(_)) => bail!("set only one of BACKUP_URL and BACKUP_DIR"),
      (Some(url), None) => {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
          bail!("BACKUP_URL must be an http(s) URL, got `{url}`");
        }
        Some(BackupTarget::Http {
          url,
          token: var("BACKUP_TOKEN"),
          secret: var("SERVER_SECRET"),
        })
      }
      (None, Some(dir)) => Some(BackupTarget::Dir(dir.into())),
      (None, None) => None,
    };

    let backup_timeout = match var("BACKUP_TIMEOUT") {
      Some(raw) => humantime::parse_duration(&raw)
        .with_context(|| format!("Invalid BACKUP_TIMEOUT `{raw}`"))?,
      None => Duration::from_secs(30),
    };

    let port = match var("PORT") {
      Some(port) => port.parse().context("Invalid PORT")?,
      None => 3000,
    };

    Ok(Self {
      token,
      admins: admin_ids.into_iter().collect(),
      database_path,
      order_recipient,
      backup,
      backup_key,
      backup_timeout,
      port,
    })
  }

  pub fn database_url(&self) -> String {
    format!("sqlite:{}?mode=rwc", self.database_path.display())
  }
}

/// Comma separated ids, order kept so the first admin is well defined.
fn parse_ids(list: &str) -> Result<Vec<i64>, std::num::ParseIntError> {
  list
    .split(',')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(str::parse)
    .collect()
}
