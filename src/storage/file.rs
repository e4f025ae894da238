use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use super::{DurableStore, StorageResult};

/// Keeps the whole key space as one JSON object in a file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn read_all(&self) -> StorageResult<Map<String, Value>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        let value = match serde_json::from_str::<Value>(&content) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "store file is not valid JSON, treating as empty"
                );
                return Ok(Map::new());
            }
        };
        match value {
            Value::Object(map) => Ok(map),
            other => {
                tracing::warn!(
                    path = %self.path.display(),
                    kind = json_kind(&other),
                    "store file does not hold an object, treating as empty"
                );
                Ok(Map::new())
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl DurableStore for JsonFileStore {
    async fn get(&self, keys: &[&str]) -> StorageResult<Map<String, Value>> {
        let mut all = self.read_all().await?;
        Ok(keys
            .iter()
            .filter_map(|key| all.remove(*key).map(|value| ((*key).to_owned(), value)))
            .collect())
    }

    async fn set(&self, items: Map<String, Value>) -> StorageResult<()> {
        let mut all = self.read_all().await?;
        all.extend(items);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        // Readers only ever see a complete file: write aside, then rename over.
        let encoded = serde_json::to_string_pretty(&Value::Object(all))?;
        let staging = self.staging_path();
        tokio::fs::write(&staging, encoded).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        Ok(())
    }
}
