use std::path::Path;

use libsql::{Builder, Connection, Database};
use serde_json::{Map, Value};

use super::{DurableStore, StorageResult};

const MIGRATIONS: &[(&str, &str)] = &[
    (
        "000_migrations_table.sql",
        include_str!("migrations/000_migrations_table.sql"),
    ),
    ("001_kv.sql", include_str!("migrations/001_kv.sql")),
];

/// Values are stored as JSON text in a single `kv` table.
pub struct LibsqlStore {
    _db: Database,
    conn: Connection,
}

impl LibsqlStore {
    /// Opens (or creates) a local database file. `":memory:"` gives a private
    /// in-memory database.
    pub async fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Builder::new_local(path.as_ref()).build().await?;
        let conn = db.connect()?;
        conn.query("SELECT 1", ()).await?;

        for (name, sql) in MIGRATIONS {
            Self::run_migration(&conn, name, sql).await?;
        }

        Ok(Self { _db: db, conn })
    }

    async fn is_migration_applied(conn: &Connection, name: &str) -> StorageResult<bool> {
        let query = "SELECT 1 FROM _migrations WHERE name = ?";
        match conn.query(query, libsql::params![name]).await {
            Ok(mut rows) => Ok(rows.next().await?.is_some()),
            Err(e) => {
                if e.to_string().contains("no such table") {
                    Ok(false)
                } else {
                    Err(e.into())
                }
            }
        }
    }

    async fn run_migration(conn: &Connection, name: &str, sql: &str) -> StorageResult<()> {
        if Self::is_migration_applied(conn, name).await? {
            tracing::debug!("migration {} already applied, skipping", name);
            return Ok(());
        }

        tracing::info!("applying migration: {}", name);
        conn.execute_batch(sql).await?;
        conn.execute(
            "INSERT INTO _migrations (name, applied_at) VALUES (?, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))",
            libsql::params![name],
        )
        .await?;
        Ok(())
    }
}

impl DurableStore for LibsqlStore {
    async fn get(&self, keys: &[&str]) -> StorageResult<Map<String, Value>> {
        let mut found = Map::new();
        for key in keys {
            let mut rows = self
                .conn
                .query("SELECT value FROM kv WHERE key = ?", libsql::params![*key])
                .await?;
            if let Some(row) = rows.next().await? {
                let raw: String = row.get(0)?;
                found.insert((*key).to_owned(), serde_json::from_str(&raw)?);
            }
        }
        Ok(found)
    }

    async fn set(&self, items: Map<String, Value>) -> StorageResult<()> {
        for (key, value) in items {
            let encoded = serde_json::to_string(&value)?;
            self.conn
                .execute(
                    r#"
                    INSERT INTO kv (key, value) VALUES (?, ?)
                    ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                    "#,
                    libsql::params![key, encoded],
                )
                .await?;
        }
        Ok(())
    }
}
