mod backup;
mod config;
mod conversation;
mod entity;
mod error;
mod plugins;
mod prelude;
mod report;
mod state;
mod sv;
pub mod utils;

use sea_orm::ConnectOptions;
use tracing_subscriber::{
  EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::{
  backup::{Notifier, Restored, Worker},
  config::Config,
  plugins::App,
  prelude::*,
  state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();

  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
      "agent_ledger=debug,sea_orm=warn,tower_http=debug".into()
    }))
    .with(tracing_subscriber::fmt::layer())
    .init();

  let config = Config::from_env()?;

  info!("Starting Agent Ledger v{}", env!("CARGO_PKG_VERSION"));

  let store = config.backup.as_ref().map(|target| target.store());

  // a failed fetch must not let an empty local store overwrite the remote
  if let Some(store) = &store {
    match backup::restore(
      &**store,
      &config.backup_key,
      &config.database_path,
      config.backup_timeout,
    )
    .await?
    {
      Restored::Installed { bytes } => info!(
        "restored {} ({bytes} bytes) from {} store",
        config.database_path.display(),
        store.name()
      ),
      Restored::Absent => info!("no remote copy yet, starting fresh"),
    }
  }

  let mut opts = ConnectOptions::new(config.database_url());
  opts.max_connections(1).min_connections(1).sqlx_logging(false);
  let db = Database::connect(opts).await?;
  migration::Migrator::up(&db, None).await?;

  let (sync, worker) = match store {
    Some(store) => {
      let (sync, handle) = Worker::new(
        db.clone(),
        store,
        config.backup_key.clone(),
        config.backup_timeout,
      )
      .spawn();
      (sync, Some(handle))
    }
    None => {
      warn!("BACKUP_URL and BACKUP_DIR are unset, remote backups disabled");
      (Notifier::disabled(), None)
    }
  };

  let app = Arc::new(AppState::new(db, config, sync));

  App::new()
    .register(plugins::server::Plugin)
    .register(plugins::telegram::Plugin)
    .run(app.clone())
    .await;

  app.shutdown.cancel();
  app.sync.shutdown().await;
  if let Some(worker) = worker
    && let Err(e) = worker.await
  {
    error!("backup worker panicked: {e}");
  }

  info!("bye");
  Ok(())
}
