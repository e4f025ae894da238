use anyhow::{Context, Result};
use clap::Parser;
use inkmark::config::{Cli, Command, Config, default_config_dir, default_config_path};
use inkmark::storage::ConfiguredStore;
use inkmark::store::HighlightStore;
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Cli::parse();

    // Data (the highlight file or database) lives next to the config file.
    let (config_path, data_dir) = match args.config_path {
        Some(path) => {
            let path = std::path::PathBuf::from(path);
            let dir = path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| std::path::PathBuf::from("."));
            (path, dir)
        }
        None => (default_config_path(), default_config_dir()),
    };

    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut cfg = if config_path.exists() {
        Config::new(&config_path).inspect_err(|e| {
            tracing::error!(error = %e, path = ?config_path, "failed to load config file");
        })?
    } else {
        tracing::info!(path = ?config_path, "no config file, using defaults");
        Config::default()
    };
    cfg.storage.rooted_at(&data_dir);

    let backend = ConfiguredStore::open(&cfg.storage).await.inspect_err(|e| {
        tracing::error!(error = %inkmark::unpack_error(e), "failed to open storage");
    })?;
    let store = HighlightStore::with_key(backend, cfg.app.storage_key.clone());

    let output = match args.command {
        Command::Pages => serde_json::to_value(store.pages().await?)?,
        Command::List { url } => serde_json::to_value(store.get(&url).await?)?,
        Command::Delete { url, address } => {
            let removed = store.delete(&url, &address).await?;
            tracing::info!(url = %url, address = %address, removed, "highlights deleted");
            json!({ "removed": removed })
        }
        Command::Clear { url } => {
            let removed = store.clear(&url).await?;
            tracing::info!(url = %url, removed, "page cleared");
            json!({ "removed": removed })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
